//! CLI command definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::StrategyKind;

#[derive(Parser, Debug)]
#[command(name = "enft")]
#[command(about = "enft - Encrypted image NFTs with provable secret transfer", long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new keypair
    Keygen,

    /// Derive a keypair from a wallet seed
    DeriveKey {
        /// Seed bytes as hex
        #[arg(short, long)]
        seed: String,

        /// Derivation path, e.g. 0/1/2
        #[arg(short, long, default_value = "0")]
        path: String,
    },

    /// Generate a fresh secret encrypted to a public key
    Secret {
        /// Recipient public key (hex)
        #[arg(short = 'k', long)]
        public_key: String,
    },

    /// Obfuscate an image under a fresh secret
    Obfuscate {
        /// Input image
        #[arg(short, long)]
        image: PathBuf,

        /// Where to write the obfuscated PNG
        #[arg(short, long)]
        out: PathBuf,

        /// Where to write the locked pixel values
        #[arg(short = 'x', long)]
        cipher: PathBuf,

        /// Owner public key (hex)
        #[arg(short = 'k', long)]
        public_key: String,

        /// Mask strategy: uniform, edge-detection, cross, random-block
        #[arg(short, long)]
        strategy: Option<StrategyKind>,

        /// Seed for the random-block strategy
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Re-encrypt a secret for a new owner and prove it
    Transfer {
        /// Current encrypted secret (hex)
        #[arg(short, long)]
        prev: String,

        /// Current owner's private key (hex)
        #[arg(short = 'k', long)]
        private_key: String,

        /// Recipient public key (hex)
        #[arg(short, long)]
        recipient: String,

        /// Where to write the transfer bundle (stdout if omitted)
        #[arg(short, long)]
        bundle: Option<PathBuf>,
    },

    /// Verify a transfer bundle
    Verify {
        /// Transfer bundle JSON file
        #[arg(short, long)]
        bundle: PathBuf,
    },

    /// Restore an obfuscated image
    Deobfuscate {
        /// Obfuscated PNG
        #[arg(short, long)]
        image: PathBuf,

        /// Locked pixel values
        #[arg(short = 'x', long)]
        cipher: PathBuf,

        /// Encrypted secret (hex)
        #[arg(short, long)]
        encrypted_secret: String,

        /// Owner private key (hex)
        #[arg(short = 'k', long)]
        private_key: String,

        /// Where to write the restored PNG
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Publish, sell and reveal an image through an in-memory relay
    Trade {
        /// Input image
        #[arg(short, long)]
        image: PathBuf,

        /// Seller name
        #[arg(long, default_value = "seller")]
        seller: String,

        /// Buyer name
        #[arg(long, default_value = "buyer")]
        buyer: String,

        /// Mask strategy
        #[arg(short, long)]
        strategy: Option<StrategyKind>,

        /// Where to write the image the buyer recovers
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Parse a derivation path like `0/1/2` (an optional leading `m/` is ignored)
pub fn parse_path(path: &str) -> Result<Vec<u32>, std::num::ParseIntError> {
    let trimmed = path.trim().trim_start_matches("m/");
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed.split('/').map(|part| part.trim().parse()).collect()
}
