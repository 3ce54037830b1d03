//! Cryptographic core: curve adapter, keys, secret encryption, symmetric
//! lock and the re-encryption proof

pub mod elgamal;
pub mod group;
pub mod keys;
pub mod lock;
pub mod proof;

pub use elgamal::{decrypt_secret, encrypt_secret, EncryptedSecret, Randomness, Secret};
pub use group::{GroupElement, Scalar, POINT_LEN, SCALAR_LEN};
pub use keys::{
    derive_private_key, derive_public_key, generate_private_key, KeyRecord, Keypair, PrivateKey,
    PublicKey,
};
pub use lock::{lock_values, unlock_values, LockedValues};
pub use proof::{
    prove_transfer, reencrypt_with_proof, verify_transfer, TransferBundle, TransferProof,
    TransferStatement,
};
