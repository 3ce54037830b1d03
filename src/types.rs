//! Core types used throughout enft

use blake2::{Blake2b512, Digest};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a party (seller, buyer) as known to the identity store
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyId(pub String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an obfuscated asset
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl AssetId {
    /// Derive an asset id from the seller, the asset name, the current time
    /// and 16 random bytes
    pub fn generate(seller: &PartyId, name: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);

        let mut hasher = Blake2b512::new();
        hasher.update(seller.0.as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        hasher.update(nanos.to_be_bytes());
        hasher.update(salt);
        let digest = hasher.finalize();

        Self(format!("asset_{}", hex::encode(&digest[..8])))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
