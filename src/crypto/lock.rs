//! Symmetric lock over the masked pixel values.
//!
//! AES-256-GCM keyed by a hash of the per-asset secret. Every ciphertext
//! carries its own random 96-bit nonce.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use blake2::{Blake2b512, Digest};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::elgamal::Secret;
use crate::error::{EnftError, Result};
use crate::obfuscation::MaskedValues;

pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
pub const TAG_LEN: usize = 16;

const KEY_DOMAIN: &[u8] = b"enft/lock-key/v1";
const AAD: &[u8] = b"enft/masked-values/v1";

/// Encrypted [`MaskedValues`] plus the nonce they were sealed under
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedValues {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl LockedValues {
    /// `nonce || ciphertext`, the blob handed to object storage
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(EnftError::DecryptionIntegrity(format!(
                "locked blob too short: {} bytes",
                bytes.len()
            )));
        }
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[..NONCE_LEN]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_LEN..].to_vec(),
        })
    }
}

/// `Blake2b-512(domain || secret)[..32]`
fn derive_key(secret: &Secret) -> Zeroizing<[u8; KEY_LEN]> {
    let mut hasher = Blake2b512::new();
    hasher.update(KEY_DOMAIN);
    hasher.update(secret.to_bytes().as_slice());
    let mut digest = Zeroizing::new([0u8; 64]);
    digest.copy_from_slice(&hasher.finalize());

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    key.copy_from_slice(&digest[..KEY_LEN]);
    key
}

fn cipher_for(secret: &Secret) -> Result<Aes256Gcm> {
    let key = derive_key(secret);
    Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| EnftError::Encryption(e.to_string()))
}

/// Serialize and encrypt the masked values under a key derived from `secret`
pub fn lock_values(values: &MaskedValues, secret: &Secret) -> Result<LockedValues> {
    lock_values_with_rng(values, secret, &mut OsRng)
}

pub fn lock_values_with_rng<R: RngCore + CryptoRng>(
    values: &MaskedValues,
    secret: &Secret,
    rng: &mut R,
) -> Result<LockedValues> {
    let plaintext = Zeroizing::new(
        serde_json::to_vec(values).map_err(|e| EnftError::Serialization(e.to_string()))?,
    );

    let mut nonce = [0u8; NONCE_LEN];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|e| EnftError::EntropySource(e.to_string()))?;

    let ciphertext = cipher_for(secret)?
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext.as_slice(),
                aad: AAD,
            },
        )
        .map_err(|e| EnftError::Encryption(e.to_string()))?;

    tracing::debug!(
        pixels = values.pixels.len(),
        bytes = ciphertext.len(),
        "Locked masked values"
    );

    Ok(LockedValues { nonce, ciphertext })
}

/// Decrypt and deserialize. A wrong secret fails the authentication tag.
pub fn unlock_values(locked: &LockedValues, secret: &Secret) -> Result<MaskedValues> {
    let plaintext = cipher_for(secret)?
        .decrypt(
            Nonce::from_slice(&locked.nonce),
            Payload {
                msg: &locked.ciphertext,
                aad: AAD,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| {
            EnftError::DecryptionIntegrity("authentication tag mismatch".to_string())
        })?;

    serde_json::from_slice(&plaintext).map_err(|e| {
        EnftError::DecryptionIntegrity(format!("recovered plaintext is malformed: {}", e))
    })
}
