//! Party key management: private scalars, public points, identity-store rows

use std::fmt;

use blake2::digest::Mac;
use blake2::Blake2bMac512;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use super::group::{GroupElement, Scalar, POINT_LEN, SCALAR_LEN, WIDE_LEN};
use crate::error::{EnftError, Result};

/// Key for the root of the hierarchical derivation chain
const SEED_DERIVATION_KEY: &[u8] = b"enft bls12381 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

/// A party's private scalar. Cleared on drop, never serialized.
#[derive(Clone)]
pub struct PrivateKey(Scalar);

impl PrivateKey {
    pub(crate) fn from_scalar(scalar: Scalar) -> Result<Self> {
        if scalar.is_zero() {
            return Err(EnftError::InvalidKey("private key must be non-zero".to_string()));
        }
        Ok(Self(scalar))
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.0
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_scalar(Scalar::from_bytes(bytes)?)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Self::from_scalar(Scalar::from_hex(hex_str)?)
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; SCALAR_LEN]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.to_bytes()))
    }

    pub fn public_key(&self) -> PublicKey {
        derive_public_key(self)
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A party's public point `G * private`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupElement", into = "GroupElement")]
pub struct PublicKey(GroupElement);

impl PublicKey {
    pub fn from_element(element: GroupElement) -> Result<Self> {
        if element.is_identity() {
            return Err(EnftError::InvalidKey(
                "public key must not be the identity".to_string(),
            ));
        }
        Ok(Self(element))
    }

    pub fn element(&self) -> &GroupElement {
        &self.0
    }

    pub fn to_bytes(&self) -> [u8; POINT_LEN] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_element(GroupElement::from_bytes(bytes)?)
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex()
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Self::from_element(GroupElement::from_hex(hex_str)?)
    }

    /// Short prefix used in log lines
    pub fn fingerprint(&self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl TryFrom<GroupElement> for PublicKey {
    type Error = EnftError;

    fn try_from(element: GroupElement) -> Result<Self> {
        Self::from_element(element)
    }
}

impl From<PublicKey> for GroupElement {
    fn from(key: PublicKey) -> Self {
        key.0
    }
}

/// Draw a private key from the operating system's CSPRNG
pub fn generate_private_key() -> Result<PrivateKey> {
    generate_private_key_with_rng(&mut OsRng)
}

pub fn generate_private_key_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<PrivateKey> {
    PrivateKey::from_scalar(Scalar::random(rng)?)
}

/// `G * private`
pub fn derive_public_key(private: &PrivateKey) -> PublicKey {
    PublicKey(GroupElement::mul_base(private.scalar()))
}

/// Deterministically derive a private key from a wallet seed and a path of
/// indices. Every index is hardened.
pub fn derive_private_key(seed: &[u8], path: &[u32]) -> Result<PrivateKey> {
    let mut node = Zeroizing::new(mac(SEED_DERIVATION_KEY, &[seed])?);
    let mut data = Zeroizing::new([0u8; 1 + 32 + 4]);

    for index in path {
        let hardened = HARDENED_OFFSET | index;
        data[1..33].copy_from_slice(&node[..32]);
        data[33..].copy_from_slice(&hardened.to_be_bytes());
        *node = mac(&node[32..], &[&data[..]])?;
    }

    PrivateKey::from_scalar(Scalar::from_wide_bytes(&node)).map_err(|_| {
        EnftError::KeyDerivation("derivation produced the zero scalar".to_string())
    })
}

fn mac(key: &[u8], parts: &[&[u8]]) -> Result<[u8; WIDE_LEN]> {
    let mut mac = <Blake2bMac512 as Mac>::new_from_slice(key)
        .map_err(|e| EnftError::KeyDerivation(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; WIDE_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// A party's keypair
#[derive(Clone, Debug)]
pub struct Keypair {
    private: PrivateKey,
    public: PublicKey,
}

impl Keypair {
    pub fn generate() -> Result<Self> {
        Ok(Self::from_private(generate_private_key()?))
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        Ok(Self::from_private(generate_private_key_with_rng(rng)?))
    }

    pub fn from_private(private: PrivateKey) -> Self {
        let public = derive_public_key(&private);
        Self { private, public }
    }

    pub fn private(&self) -> &PrivateKey {
        &self.private
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// The row persisted by an identity store
    pub fn to_record(&self) -> KeyRecord {
        KeyRecord {
            private_key: *self.private.to_bytes(),
            public_key: self.public.to_bytes(),
        }
    }

    /// Load a stored row, checking that both halves belong together
    pub fn from_record(record: &KeyRecord) -> Result<Self> {
        let keypair = Self::from_private(PrivateKey::from_bytes(&record.private_key)?);
        if keypair.public.to_bytes() != record.public_key {
            return Err(EnftError::InvalidKey(
                "stored public key does not match the stored private key".to_string(),
            ));
        }
        Ok(keypair)
    }
}

/// Identity-store row: `{ private scalar bytes, public point bytes }`
#[derive(Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub private_key: [u8; SCALAR_LEN],
    pub public_key: [u8; POINT_LEN],
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRecord")
            .field("private_key", &"<redacted>")
            .field("public_key", &hex::encode(self.public_key))
            .finish()
    }
}
