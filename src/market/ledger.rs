//! Ownership ledger for encrypted secrets.
//!
//! Every asset has exactly one active ciphertext. A transfer is applied only
//! when it starts from that ciphertext, is signed off by its current owner and
//! carries a valid re-encryption proof. The replaced ciphertext stays in the
//! history as superseded.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::crypto::{verify_transfer, EncryptedSecret, PublicKey, TransferBundle};
use crate::error::{EnftError, Result};
use crate::types::AssetId;

/// Lifecycle of one ciphertext of an asset's secret
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretState {
    /// Decryptable by `owner`, the asset's current holder
    Active { owner: PublicKey },
    /// Replaced by a later transfer; kept for audit only
    Superseded { owner: PublicKey },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextEntry {
    pub encrypted: EncryptedSecret,
    pub state: SecretState,
}

/// Everything the ledger knows about one asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub asset: AssetId,
    /// Oldest first. Only the last entry is active.
    pub history: Vec<CiphertextEntry>,
}

impl AssetRecord {
    fn new(asset: AssetId, owner: PublicKey, encrypted: EncryptedSecret) -> Self {
        Self {
            asset,
            history: vec![CiphertextEntry {
                encrypted,
                state: SecretState::Active { owner },
            }],
        }
    }

    fn active_entry(&self) -> Option<(&EncryptedSecret, &PublicKey)> {
        self.history.last().and_then(|entry| match &entry.state {
            SecretState::Active { owner } => Some((&entry.encrypted, owner)),
            SecretState::Superseded { .. } => None,
        })
    }

    /// The ciphertext and owner currently in force
    pub fn active(&self) -> Result<(EncryptedSecret, PublicKey)> {
        self.active_entry()
            .map(|(encrypted, owner)| (*encrypted, *owner))
            .ok_or_else(|| EnftError::AssetNotFound(self.asset.to_string()))
    }

    pub fn owner(&self) -> Result<PublicKey> {
        self.active().map(|(_, owner)| owner)
    }

    pub fn transfers(&self) -> usize {
        self.history.len().saturating_sub(1)
    }

    fn supersede_with(&mut self, encrypted: EncryptedSecret, owner: PublicKey) {
        if let Some(last) = self.history.last_mut() {
            if let SecretState::Active { owner: previous } = last.state {
                last.state = SecretState::Superseded { owner: previous };
            }
        }
        self.history.push(CiphertextEntry {
            encrypted,
            state: SecretState::Active { owner },
        });
    }
}

/// Result of submitting a transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Applied,
    /// The same bundle had already been applied; nothing changed
    AlreadyApplied,
}

/// The authority that decides which ciphertext of a secret is in force
pub trait Ledger {
    fn register(&self, asset: &AssetId, owner: PublicKey, encrypted: EncryptedSecret) -> Result<()>;

    fn submit_transfer(&self, asset: &AssetId, bundle: &TransferBundle) -> Result<TransferOutcome>;

    fn record(&self, asset: &AssetId) -> Result<AssetRecord>;

    /// Forget a cancelled asset
    fn withdraw(&self, asset: &AssetId) -> Result<()>;
}

/// Ledger kept in process memory, verifying every proof itself
#[derive(Debug, Default)]
pub struct MemoryLedger {
    assets: Mutex<HashMap<AssetId, AssetRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn assets(&self) -> Result<MutexGuard<'_, HashMap<AssetId, AssetRecord>>> {
        self.assets
            .lock()
            .map_err(|_| EnftError::Storage("ledger lock poisoned".to_string()))
    }
}

impl Ledger for MemoryLedger {
    fn register(&self, asset: &AssetId, owner: PublicKey, encrypted: EncryptedSecret) -> Result<()> {
        let mut assets = self.assets()?;
        if assets.contains_key(asset) {
            return Err(EnftError::AssetAlreadyExists(asset.to_string()));
        }

        assets.insert(asset.clone(), AssetRecord::new(asset.clone(), owner, encrypted));
        tracing::info!(asset = %asset, owner = %owner.fingerprint(), "Registered asset");
        Ok(())
    }

    fn submit_transfer(&self, asset: &AssetId, bundle: &TransferBundle) -> Result<TransferOutcome> {
        let mut assets = self.assets()?;
        let record = assets
            .get_mut(asset)
            .ok_or_else(|| EnftError::AssetNotFound(asset.to_string()))?;
        let (active, owner) = record.active()?;
        let statement = &bundle.statement;

        // replay of the transfer that produced the active ciphertext
        if active == statement.new && owner == statement.recipient_public {
            let previous = record.history.len().checked_sub(2).map(|i| &record.history[i]);
            if previous.map(|p| p.encrypted) == Some(statement.prev) && bundle.verify() {
                tracing::debug!(asset = %asset, "Transfer already applied");
                return Ok(TransferOutcome::AlreadyApplied);
            }
        }

        if statement.prev != active {
            tracing::warn!(asset = %asset, "Rejected transfer from a stale ciphertext");
            return Err(EnftError::StaleCiphertext(asset.to_string()));
        }

        if statement.sender_public != owner {
            tracing::warn!(
                asset = %asset,
                sender = %statement.sender_public.fingerprint(),
                "Rejected transfer from a non-owner"
            );
            return Err(EnftError::NotOwner {
                party: statement.sender_public.fingerprint(),
                asset: asset.to_string(),
            });
        }

        if !verify_transfer(statement, &bundle.proof) {
            tracing::warn!(asset = %asset, "Rejected transfer with an invalid proof");
            return Err(EnftError::ProofVerification(format!(
                "re-encryption proof for {} does not verify",
                asset
            )));
        }

        record.supersede_with(statement.new, statement.recipient_public);
        tracing::info!(
            asset = %asset,
            from = %statement.sender_public.fingerprint(),
            to = %statement.recipient_public.fingerprint(),
            transfers = record.transfers(),
            "Transfer applied"
        );
        Ok(TransferOutcome::Applied)
    }

    fn record(&self, asset: &AssetId) -> Result<AssetRecord> {
        self.assets()?
            .get(asset)
            .cloned()
            .ok_or_else(|| EnftError::AssetNotFound(asset.to_string()))
    }

    fn withdraw(&self, asset: &AssetId) -> Result<()> {
        if self.assets()?.remove(asset).is_none() {
            return Err(EnftError::AssetNotFound(asset.to_string()));
        }
        tracing::info!(asset = %asset, "Withdrew asset");
        Ok(())
    }
}
