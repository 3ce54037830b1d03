//! Re-encryption consistency proof.
//!
//! A Fiat–Shamir sigma protocol showing that `new` encrypts, under the
//! recipient's key, the same secret that `prev` encrypts under the sender's
//! key. The prover knows the sender's private key `sk` and the fresh
//! randomness `r` of the re-encryption:
//!
//! ```text
//! u1 = G*α            u2 = G*β            v = prev.ephemeral*α − recipient*β
//! c  = H(sender, recipient, prev.ephemeral, prev.cipher,
//!        new.ephemeral, new.cipher, u1, u2, v)
//! s1 = α + c·sk       s2 = β + c·r
//! ```
//!
//! The verifier accepts iff
//!
//! ```text
//! G*s1 == u1 + sender*c
//! G*s2 == u2 + new.ephemeral*c
//! prev.ephemeral*s1 − recipient*s2 == v + (prev.cipher − new.cipher)*c
//! ```

use blake2::{Blake2b512, Digest};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::elgamal::{decrypt_secret, encrypt_secret, EncryptedSecret, Randomness};
use super::group::{GroupElement, Scalar, POINT_LEN, SCALAR_LEN, WIDE_LEN};
use super::keys::{derive_public_key, Keypair, PrivateKey, PublicKey};
use crate::error::{EnftError, Result};

/// The public context a transfer proof is bound to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatement {
    pub sender_public: PublicKey,
    pub recipient_public: PublicKey,
    pub prev: EncryptedSecret,
    pub new: EncryptedSecret,
}

/// Commitments and responses of the sigma protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProof {
    pub u1: GroupElement,
    pub u2: GroupElement,
    pub v: GroupElement,
    pub s1: Scalar,
    pub s2: Scalar,
}

impl TransferProof {
    pub const ENCODED_LEN: usize = 3 * POINT_LEN + 2 * SCALAR_LEN;

    /// `u1 || u2 || v || s1 || s2`
    pub fn to_bytes(&self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[..POINT_LEN].copy_from_slice(&self.u1.to_bytes());
        out[POINT_LEN..2 * POINT_LEN].copy_from_slice(&self.u2.to_bytes());
        out[2 * POINT_LEN..3 * POINT_LEN].copy_from_slice(&self.v.to_bytes());
        out[3 * POINT_LEN..3 * POINT_LEN + SCALAR_LEN].copy_from_slice(&self.s1.to_bytes());
        out[3 * POINT_LEN + SCALAR_LEN..].copy_from_slice(&self.s2.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(EnftError::Deserialization(format!(
                "transfer proof must be {} bytes, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            )));
        }
        let s1_at = 3 * POINT_LEN;
        let s2_at = s1_at + SCALAR_LEN;
        Ok(Self {
            u1: GroupElement::from_bytes(&bytes[..POINT_LEN])?,
            u2: GroupElement::from_bytes(&bytes[POINT_LEN..2 * POINT_LEN])?,
            v: GroupElement::from_bytes(&bytes[2 * POINT_LEN..s1_at])?,
            s1: Scalar::from_bytes(&bytes[s1_at..s2_at])?,
            s2: Scalar::from_bytes(&bytes[s2_at..])?,
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(hex_str.trim())?)
    }
}

/// What a ledger receives for one transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBundle {
    pub statement: TransferStatement,
    pub proof: TransferProof,
}

impl TransferBundle {
    pub fn verify(&self) -> bool {
        verify_transfer(&self.statement, &self.proof)
    }
}

/// Fiat–Shamir challenge over the canonical encodings of all nine elements.
/// The whole 512-bit digest is reduced modulo the group order.
pub fn challenge(
    statement: &TransferStatement,
    u1: &GroupElement,
    u2: &GroupElement,
    v: &GroupElement,
) -> Scalar {
    let mut hasher = Blake2b512::new();
    hasher.update(statement.sender_public.to_bytes());
    hasher.update(statement.recipient_public.to_bytes());
    hasher.update(statement.prev.ephemeral.to_bytes());
    hasher.update(statement.prev.cipher.to_bytes());
    hasher.update(statement.new.ephemeral.to_bytes());
    hasher.update(statement.new.cipher.to_bytes());
    hasher.update(u1.to_bytes());
    hasher.update(u2.to_bytes());
    hasher.update(v.to_bytes());

    let mut digest = [0u8; WIDE_LEN];
    digest.copy_from_slice(&hasher.finalize());
    Scalar::from_wide_bytes(&digest)
}

/// Prove that `statement.new` re-encrypts `statement.prev` for the recipient
pub fn prove_transfer(
    statement: &TransferStatement,
    sender_private: &PrivateKey,
    randomness: &Randomness,
) -> Result<TransferProof> {
    prove_transfer_with_rng(statement, sender_private, randomness, &mut OsRng)
}

pub fn prove_transfer_with_rng<R: RngCore + CryptoRng>(
    statement: &TransferStatement,
    sender_private: &PrivateKey,
    randomness: &Randomness,
    rng: &mut R,
) -> Result<TransferProof> {
    if derive_public_key(sender_private) != statement.sender_public {
        return Err(EnftError::ProofGeneration(
            "sender private key does not match the statement".to_string(),
        ));
    }
    if GroupElement::mul_base(randomness.scalar()) != statement.new.ephemeral {
        return Err(EnftError::ProofGeneration(
            "randomness was not used for the new ciphertext".to_string(),
        ));
    }

    let mut alpha = Scalar::random(rng)?;
    let mut beta = Scalar::random(rng)?;

    let u1 = GroupElement::mul_base(&alpha);
    let u2 = GroupElement::mul_base(&beta);
    let v = statement.prev.ephemeral * alpha - *statement.recipient_public.element() * beta;

    let c = challenge(statement, &u1, &u2, &v);
    let mut key_term = c * *sender_private.scalar();
    let mut randomness_term = c * *randomness.scalar();
    let s1 = alpha + key_term;
    let s2 = beta + randomness_term;

    alpha.zeroize();
    beta.zeroize();
    key_term.zeroize();
    randomness_term.zeroize();

    tracing::debug!(
        sender = %statement.sender_public.fingerprint(),
        recipient = %statement.recipient_public.fingerprint(),
        "Generated transfer proof"
    );

    Ok(TransferProof { u1, u2, v, s1, s2 })
}

/// Pure verification predicate. `false` is the designed negative outcome,
/// not an error.
pub fn verify_transfer(statement: &TransferStatement, proof: &TransferProof) -> bool {
    let c = challenge(statement, &proof.u1, &proof.u2, &proof.v);

    let sender = *statement.sender_public.element();
    let recipient = *statement.recipient_public.element();

    let knows_sender_key = GroupElement::mul_base(&proof.s1) == proof.u1 + sender * c;
    let knows_randomness = GroupElement::mul_base(&proof.s2) == proof.u2 + statement.new.ephemeral * c;
    let same_secret = statement.prev.ephemeral * proof.s1 - recipient * proof.s2
        == proof.v + (statement.prev.cipher - statement.new.cipher) * c;

    knows_sender_key && knows_randomness && same_secret
}

/// Decrypt `prev` with the sender's key, re-encrypt for the recipient with
/// fresh randomness, and prove the two ciphertexts consistent.
///
/// The secret and the randomness never leave this function.
pub fn reencrypt_with_proof(
    prev: &EncryptedSecret,
    sender: &Keypair,
    recipient_public: &PublicKey,
) -> Result<TransferBundle> {
    reencrypt_with_proof_with_rng(prev, sender, recipient_public, &mut OsRng)
}

pub fn reencrypt_with_proof_with_rng<R: RngCore + CryptoRng>(
    prev: &EncryptedSecret,
    sender: &Keypair,
    recipient_public: &PublicKey,
    rng: &mut R,
) -> Result<TransferBundle> {
    let secret = decrypt_secret(prev, sender.private());
    let randomness = Randomness::generate_with_rng(rng)?;
    let new = encrypt_secret(&secret, recipient_public, &randomness);
    drop(secret);

    let statement = TransferStatement {
        sender_public: *sender.public(),
        recipient_public: *recipient_public,
        prev: *prev,
        new,
    };
    let proof = prove_transfer_with_rng(&statement, sender.private(), &randomness, rng)?;

    Ok(TransferBundle { statement, proof })
}
