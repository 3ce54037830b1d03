//! EC-ElGamal encryption of the per-asset secret

use std::fmt;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use super::group::{GroupElement, Scalar, POINT_LEN};
use super::keys::{PrivateKey, PublicKey};
use crate::error::{EnftError, Result};

/// The per-asset secret: a group element from which the symmetric lock key
/// is derived. Cleared on drop, never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(GroupElement);

impl Secret {
    pub fn generate() -> Result<Self> {
        Self::generate_with_rng(&mut OsRng)
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        let mut r = Scalar::random(rng)?;
        let secret = Self(GroupElement::mul_base(&r));
        r.zeroize();
        Ok(secret)
    }

    pub(crate) fn element(&self) -> &GroupElement {
        &self.0
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; POINT_LEN]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self(GroupElement::from_bytes(bytes)?))
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Encryption randomness. Must be fresh for every encryption.
pub struct Randomness(Scalar);

impl Randomness {
    pub fn generate() -> Result<Self> {
        Self::generate_with_rng(&mut OsRng)
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self> {
        Ok(Self(Scalar::random(rng)?))
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.0
    }
}

impl Drop for Randomness {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Randomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Randomness(<redacted>)")
    }
}

/// EC-ElGamal ciphertext of a [`Secret`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    /// `G * r`
    pub ephemeral: GroupElement,
    /// `public * r + secret`
    pub cipher: GroupElement,
}

impl EncryptedSecret {
    pub const ENCODED_LEN: usize = 2 * POINT_LEN;

    /// `ephemeral || cipher`
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..POINT_LEN].copy_from_slice(&self.ephemeral.to_bytes());
        out[POINT_LEN..].copy_from_slice(&self.cipher.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(EnftError::InvalidGroupElement(format!(
                "encrypted secret must be {} bytes, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            )));
        }
        Ok(Self {
            ephemeral: GroupElement::from_bytes(&bytes[..POINT_LEN])?,
            cipher: GroupElement::from_bytes(&bytes[POINT_LEN..])?,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(hex_str.trim())?)
    }
}

/// `ephemeral = G * r`, `cipher = public * r + secret`
pub fn encrypt_secret(
    secret: &Secret,
    public: &PublicKey,
    randomness: &Randomness,
) -> EncryptedSecret {
    EncryptedSecret {
        ephemeral: GroupElement::mul_base(randomness.scalar()),
        cipher: *public.element() * *randomness.scalar() + *secret.element(),
    }
}

/// `secret = cipher - ephemeral * private`.
///
/// A wrong key yields a wrong secret, which the symmetric lock rejects later.
pub fn decrypt_secret(encrypted: &EncryptedSecret, private: &PrivateKey) -> Secret {
    Secret(encrypted.cipher - encrypted.ephemeral * *private.scalar())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::Keypair;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let keypair = Keypair::generate().unwrap();
        let secret = Secret::generate().unwrap();
        let randomness = Randomness::generate().unwrap();

        let encrypted = encrypt_secret(&secret, keypair.public(), &randomness);
        assert_eq!(decrypt_secret(&encrypted, keypair.private()), secret);
    }

    #[test]
    fn test_wrong_key_yields_different_secret() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let owner = Keypair::generate_with_rng(&mut rng).unwrap();
        let stranger = Keypair::generate_with_rng(&mut rng).unwrap();
        let secret = Secret::generate_with_rng(&mut rng).unwrap();
        let randomness = Randomness::generate_with_rng(&mut rng).unwrap();

        let encrypted = encrypt_secret(&secret, owner.public(), &randomness);
        assert_ne!(decrypt_secret(&encrypted, stranger.private()), secret);
    }

    #[test]
    fn test_fresh_randomness_hides_repeated_encryptions() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let keypair = Keypair::generate_with_rng(&mut rng).unwrap();
        let secret = Secret::generate_with_rng(&mut rng).unwrap();

        let r1 = Randomness::generate_with_rng(&mut rng).unwrap();
        let r2 = Randomness::generate_with_rng(&mut rng).unwrap();
        let c1 = encrypt_secret(&secret, keypair.public(), &r1);
        let c2 = encrypt_secret(&secret, keypair.public(), &r2);

        assert_ne!(c1, c2);
        assert_eq!(decrypt_secret(&c1, keypair.private()), secret);
        assert_eq!(decrypt_secret(&c2, keypair.private()), secret);
    }

    #[test]
    fn test_encrypted_secret_bytes_roundtrip() {
        let keypair = Keypair::generate().unwrap();
        let secret = Secret::generate().unwrap();
        let encrypted = encrypt_secret(&secret, keypair.public(), &Randomness::generate().unwrap());

        let decoded = EncryptedSecret::from_hex(&encrypted.to_hex()).unwrap();
        assert_eq!(decoded, encrypted);
    }

    #[test]
    fn test_encrypted_secret_rejects_malformed_points() {
        let keypair = Keypair::generate().unwrap();
        let secret = Secret::generate().unwrap();
        let encrypted = encrypt_secret(&secret, keypair.public(), &Randomness::generate().unwrap());

        let mut bytes = encrypted.to_bytes();
        bytes[EncryptedSecret::ENCODED_LEN - 1] ^= 0x01;
        assert!(matches!(
            EncryptedSecret::from_bytes(&bytes),
            Err(EnftError::InvalidGroupElement(_))
        ));
        assert!(EncryptedSecret::from_bytes(&bytes[..90]).is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::generate().unwrap();
        assert_eq!(format!("{:?}", secret), "Secret(<redacted>)");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn proptest_decrypt_inverts_encrypt(seed in any::<u64>()) {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let keypair = Keypair::generate_with_rng(&mut rng).unwrap();
            let secret = Secret::generate_with_rng(&mut rng).unwrap();
            let randomness = Randomness::generate_with_rng(&mut rng).unwrap();

            let encrypted = encrypt_secret(&secret, keypair.public(), &randomness);
            prop_assert_eq!(decrypt_secret(&encrypted, keypair.private()), secret);
        }
    }

    #[test]
    fn test_randomness_and_secret_fail_without_entropy() {
        use crate::crypto::group::FailingRng;

        assert!(matches!(
            Randomness::generate_with_rng(&mut FailingRng),
            Err(EnftError::EntropySource(_))
        ));
        assert!(matches!(
            Secret::generate_with_rng(&mut FailingRng),
            Err(EnftError::EntropySource(_))
        ));
    }
}
