//! enft: encrypted image NFTs
//!
//! Part of an image is hidden under a per-asset secret. The secret itself is
//! EC-ElGamal encrypted to the owner's key on BLS12-381 G1. Selling the asset
//! re-encrypts the secret to the buyer and attaches a non-interactive proof
//! that both ciphertexts hold the same secret, so a ledger can check the
//! handover without learning anything about it.
//!
//! - [`crypto`]: curve adapter, keys, secret encryption, symmetric lock, transfer proof
//! - [`obfuscation`]: pixel mask strategies and image obfuscation
//! - [`market`]: identity and object stores, ownership ledger, relay

pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod market;
pub mod obfuscation;
pub mod types;

// Re-export commonly used types and functions
pub use config::{EnftConfig, ObfuscationConfig, StrategyKind};
pub use crypto::{
    decrypt_secret, encrypt_secret, generate_private_key, lock_values, prove_transfer,
    reencrypt_with_proof, unlock_values, verify_transfer, EncryptedSecret, Keypair, PrivateKey,
    PublicKey, Secret, TransferBundle, TransferProof, TransferStatement,
};
pub use error::{EnftError, Result};
pub use obfuscation::{deobfuscate, obfuscate, select_pixels, MaskStrategy, PixelCoord};
pub use types::{AssetId, PartyId};
