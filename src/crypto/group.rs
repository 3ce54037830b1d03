//! BLS12-381 G1 arithmetic with canonical fixed-width encodings.
//!
//! Points are exchanged as 48-byte compressed encodings (big-endian x
//! coordinate, flag bits in the leading byte). Scalars are exchanged as
//! 32-byte big-endian integers strictly below the group order.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use ark_bls12_381::{Fr, G1Affine, G1Projective};
use ark_ec::{CurveGroup, Group};
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::Zero;
use rand::{CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::error::{EnftError, Result};

/// Length of an encoded scalar
pub const SCALAR_LEN: usize = 32;

/// Length of an encoded (compressed) group element
pub const POINT_LEN: usize = 48;

/// Length of the digest consumed by wide reduction
pub const WIDE_LEN: usize = 64;

/// An integer modulo the order of the G1 subgroup
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Scalar(Fr);

impl Scalar {
    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    /// Draw a uniformly random non-zero scalar.
    ///
    /// 64 bytes are drawn and reduced, so the modular bias is negligible.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut wide = [0u8; WIDE_LEN];
        loop {
            rng.try_fill_bytes(&mut wide)
                .map_err(|e| EnftError::EntropySource(e.to_string()))?;
            let scalar = Self::from_wide_bytes(&wide);
            wide.zeroize();
            if !scalar.is_zero() {
                return Ok(scalar);
            }
        }
    }

    /// Reduce a 64-byte big-endian value modulo the group order
    pub fn from_wide_bytes(bytes: &[u8; WIDE_LEN]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Canonical 32-byte big-endian encoding
    pub fn to_bytes(&self) -> [u8; SCALAR_LEN] {
        let be = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; SCALAR_LEN];
        out[SCALAR_LEN - be.len()..].copy_from_slice(&be);
        out
    }

    /// Decode a canonical encoding, rejecting values `>= n`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SCALAR_LEN {
            return Err(EnftError::InvalidScalar(format!(
                "expected {} bytes, got {}",
                SCALAR_LEN,
                bytes.len()
            )));
        }

        // arkworks stores field elements little-endian
        let mut le = [0u8; SCALAR_LEN];
        le.copy_from_slice(bytes);
        le.reverse();

        let decoded = Fr::deserialize_compressed(&le[..]).map_err(|_| {
            EnftError::InvalidScalar("value is not reduced modulo the group order".to_string())
        });
        le.zeroize();
        decoded.map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let mut bytes = hex::decode(hex_str.trim())?;
        let scalar = Self::from_bytes(&bytes);
        bytes.zeroize();
        scalar
    }
}

impl Zeroize for Scalar {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", self.to_hex())
    }
}

impl Add for Scalar {
    type Output = Scalar;

    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;

    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;

    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;

    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

/// A point of the prime-order G1 subgroup
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct GroupElement(G1Projective);

impl GroupElement {
    /// The fixed generator `G`
    pub fn generator() -> Self {
        Self(G1Projective::generator())
    }

    pub fn identity() -> Self {
        Self(G1Projective::zero())
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    /// `G * scalar`
    pub fn mul_base(scalar: &Scalar) -> Self {
        Self::generator() * *scalar
    }

    /// Canonical 48-byte compressed encoding
    pub fn to_bytes(&self) -> [u8; POINT_LEN] {
        let mut out = [0u8; POINT_LEN];
        self.0
            .into_affine()
            .serialize_compressed(&mut out[..])
            .expect("compressed G1 encoding always fits in 48 bytes");
        out
    }

    /// Decode a compressed point, checking curve and subgroup membership
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != POINT_LEN {
            return Err(EnftError::InvalidGroupElement(format!(
                "expected {} bytes, got {}",
                POINT_LEN,
                bytes.len()
            )));
        }

        let affine = G1Affine::deserialize_compressed(bytes)
            .map_err(|e| EnftError::InvalidGroupElement(e.to_string()))?;
        Ok(Self(affine.into()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(hex_str.trim())?)
    }
}

impl Zeroize for GroupElement {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for GroupElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupElement({})", self.to_hex())
    }
}

impl Add for GroupElement {
    type Output = GroupElement;

    fn add(self, rhs: GroupElement) -> GroupElement {
        GroupElement(self.0 + rhs.0)
    }
}

impl Sub for GroupElement {
    type Output = GroupElement;

    fn sub(self, rhs: GroupElement) -> GroupElement {
        GroupElement(self.0 - rhs.0)
    }
}

impl Neg for GroupElement {
    type Output = GroupElement;

    fn neg(self) -> GroupElement {
        GroupElement(-self.0)
    }
}

impl Mul<Scalar> for GroupElement {
    type Output = GroupElement;

    fn mul(self, rhs: Scalar) -> GroupElement {
        GroupElement(self.0 * rhs.0)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Scalar::from_hex(&s).map_err(de::Error::custom)
    }
}

impl Serialize for GroupElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for GroupElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        GroupElement::from_hex(&s).map_err(de::Error::custom)
    }
}

/// An entropy source that always fails
#[cfg(test)]
pub(crate) struct FailingRng;

#[cfg(test)]
impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        panic!("no entropy")
    }

    fn next_u64(&mut self) -> u64 {
        panic!("no entropy")
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        panic!("no entropy")
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        Err(rand::Error::new("no entropy"))
    }
}

#[cfg(test)]
impl CryptoRng for FailingRng {}
