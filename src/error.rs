//! Error types for enft

use thiserror::Error;

/// Main error type for enft
#[derive(Error, Debug)]
pub enum EnftError {
    // Curve / encoding errors
    #[error("Invalid group element: {0}")]
    InvalidGroupElement(String),

    #[error("Invalid scalar: {0}")]
    InvalidScalar(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // Cryptography errors
    #[error("Entropy source failure: {0}")]
    EntropySource(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption integrity check failed: {0}")]
    DecryptionIntegrity(String),

    #[error("Proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("Proof verification failed: {0}")]
    ProofVerification(String),

    // Image errors
    #[error("Image error: {0}")]
    Image(String),

    #[error("Obfuscated image does not match its locked values: {0}")]
    ImageMismatch(String),

    // Ownership errors
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    #[error("Asset already exists: {0}")]
    AssetAlreadyExists(String),

    #[error("Party {party} does not own asset {asset}")]
    NotOwner { party: String, asset: String },

    #[error("Stale ciphertext for asset {0}: transfer does not start from the active ciphertext")]
    StaleCiphertext(String),

    // Storage errors
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

/// Result type alias for enft operations
pub type Result<T> = std::result::Result<T, EnftError>;
