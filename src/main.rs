//! enft CLI binary

use clap::Parser;
use enft::cli::{Cli, Commands, EnftApp};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = EnftApp::from_config_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Keygen => app.keygen(),

        Commands::DeriveKey { seed, path } => app.derive_key(&seed, &path),

        Commands::Secret { public_key } => app.secret(&public_key),

        Commands::Obfuscate {
            image,
            out,
            cipher,
            public_key,
            strategy,
            seed,
        } => app.obfuscate(&image, &out, &cipher, &public_key, strategy, seed),

        Commands::Transfer {
            prev,
            private_key,
            recipient,
            bundle,
        } => app.transfer(&prev, &private_key, &recipient, bundle.as_deref()),

        Commands::Verify { bundle } => app.verify(&bundle),

        Commands::Deobfuscate {
            image,
            cipher,
            encrypted_secret,
            private_key,
            out,
        } => app.deobfuscate(&image, &cipher, &encrypted_secret, &private_key, &out),

        Commands::Trade {
            image,
            seller,
            buyer,
            strategy,
            out,
        } => app.trade(&image, &seller, &buyer, strategy, &out),
    }
}
