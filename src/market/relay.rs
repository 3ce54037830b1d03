//! Custodial relay tying identities, blob storage and the ledger together.
//!
//! The relay holds every party's key in its identity store. It publishes
//! obfuscated images, performs re-encryptions on behalf of owners and reveals
//! the original image to whoever currently owns it.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::ledger::{Ledger, TransferOutcome};
use super::store::{IdentityStore, ObjectStore};
use crate::config::{EnftConfig, StrategyKind};
use crate::crypto::{
    decrypt_secret, encrypt_secret, reencrypt_with_proof, EncryptedSecret, Keypair, LockedValues,
    PublicKey, Randomness, Secret, TransferBundle,
};
use crate::error::{EnftError, Result};
use crate::obfuscation::{decode_image, deobfuscate, encode_png, obfuscate};
use crate::types::{AssetId, PartyId};

/// A published asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub asset: AssetId,
    pub seller: PartyId,
    pub name: String,
    pub strategy: StrategyKind,
    pub image_url: String,
    pub cipher_url: String,
    pub encrypted_secret: EncryptedSecret,
    pub masked: usize,
}

impl Listing {
    fn image_key(&self, folder: &str) -> String {
        format!("{}/{}", folder, self.asset)
    }

    fn cipher_key(&self, folder: &str) -> String {
        format!("{}/{}_ciphertext", folder, self.asset)
    }
}

/// Proof of an applied ownership change
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub asset: AssetId,
    pub from: PartyId,
    pub to: PartyId,
    pub bundle: TransferBundle,
    pub replayed: bool,
}

pub struct Relay<I, O, L> {
    identities: I,
    objects: O,
    ledger: L,
    config: EnftConfig,
    listings: Mutex<HashMap<AssetId, Listing>>,
}

impl<I, O, L> Relay<I, O, L>
where
    I: IdentityStore,
    O: ObjectStore,
    L: Ledger,
{
    pub fn new(identities: I, objects: O, ledger: L, config: EnftConfig) -> Self {
        Self {
            identities,
            objects,
            ledger,
            config,
            listings: Mutex::new(HashMap::new()),
        }
    }

    pub fn identities(&self) -> &I {
        &self.identities
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn listings(&self) -> Result<MutexGuard<'_, HashMap<AssetId, Listing>>> {
        self.listings
            .lock()
            .map_err(|_| EnftError::Storage("listing lock poisoned".to_string()))
    }

    pub fn listing(&self, asset: &AssetId) -> Result<Listing> {
        self.listings()?
            .get(asset)
            .cloned()
            .ok_or_else(|| EnftError::AssetNotFound(asset.to_string()))
    }

    /// Obfuscate an image for `seller` and store both halves.
    ///
    /// A fresh secret is generated per asset and immediately encrypted to the
    /// seller's key; only the ciphertext is kept.
    pub fn publish(
        &self,
        seller: &PartyId,
        name: &str,
        image_bytes: &[u8],
        strategy: StrategyKind,
    ) -> Result<Listing> {
        let keypair = self.identities.get_or_create(seller)?;
        let image = decode_image(image_bytes)?;
        let mask = self.config.obfuscation.strategy_for(
            strategy,
            image.width(),
            image.height(),
            OsRng.next_u64(),
        );

        let secret = Secret::generate()?;
        let encrypted = encrypt_secret(&secret, keypair.public(), &Randomness::generate()?);
        let obfuscated = obfuscate(&image, &mask, &secret)?;
        drop(secret);

        let asset = AssetId::generate(seller, name);
        let mut listing = Listing {
            asset: asset.clone(),
            seller: seller.clone(),
            name: name.to_string(),
            strategy,
            image_url: String::new(),
            cipher_url: String::new(),
            encrypted_secret: encrypted,
            masked: obfuscated.masked,
        };

        let image_png = encode_png(&obfuscated.image)?;

        // a rejected registration must not touch storage
        self.ledger.register(&asset, *keypair.public(), encrypted)?;
        if let Err(e) = self.store_blobs(&mut listing, image_png, obfuscated.locked.to_bytes()) {
            self.rollback_publish(&listing);
            return Err(e);
        }
        self.listings()?.insert(asset.clone(), listing.clone());

        tracing::info!(
            asset = %asset,
            seller = %seller,
            strategy = %strategy,
            masked = listing.masked,
            "Published asset"
        );
        Ok(listing)
    }

    /// Re-encrypt the asset's secret from `owner` to `recipient` and record it
    pub fn transfer(
        &self,
        asset: &AssetId,
        owner: &PartyId,
        recipient: &PartyId,
    ) -> Result<TransferReceipt> {
        let owner_keys = self.owner_keys(asset, owner)?;
        let (active, _) = self.ledger.record(asset)?.active()?;
        let recipient_keys = self.identities.get_or_create(recipient)?;

        let bundle = reencrypt_with_proof(&active, &owner_keys, recipient_keys.public())?;
        let outcome = self.ledger.submit_transfer(asset, &bundle)?;

        tracing::info!(asset = %asset, from = %owner, to = %recipient, "Transferred asset");
        Ok(TransferReceipt {
            asset: asset.clone(),
            from: owner.clone(),
            to: recipient.clone(),
            bundle,
            replayed: outcome == TransferOutcome::AlreadyApplied,
        })
    }

    /// The original image as PNG, for the current owner only
    pub fn reveal(&self, asset: &AssetId, party: &PartyId) -> Result<Vec<u8>> {
        let keys = self.owner_keys(asset, party)?;
        let (active, _) = self.ledger.record(asset)?.active()?;
        let listing = self.listing(asset)?;
        let folder = &self.config.storage.folder;

        let image = decode_image(&self.objects.get(&listing.image_key(folder))?)?;
        let locked = LockedValues::from_bytes(&self.objects.get(&listing.cipher_key(folder))?)?;

        let secret = decrypt_secret(&active, keys.private());
        let restored = deobfuscate(&image, &locked, &secret)?;
        drop(secret);

        tracing::info!(asset = %asset, party = %party, "Revealed asset");
        encode_png(&restored)
    }

    /// Withdraw an asset and delete its stored blobs. Only the current owner may cancel.
    pub fn cancel(&self, asset: &AssetId, party: &PartyId) -> Result<()> {
        self.owner_keys(asset, party)?;
        let listing = self.listing(asset)?;
        let folder = &self.config.storage.folder;

        self.objects.delete(&listing.image_key(folder))?;
        self.objects.delete(&listing.cipher_key(folder))?;
        self.ledger.withdraw(asset)?;
        self.listings()?.remove(asset);

        tracing::info!(asset = %asset, party = %party, "Cancelled asset");
        Ok(())
    }

    fn store_blobs(&self, listing: &mut Listing, image_png: Vec<u8>, locked: Vec<u8>) -> Result<()> {
        let folder = &self.config.storage.folder;
        listing.image_url = self.objects.put(&listing.image_key(folder), image_png)?;
        listing.cipher_url = self.objects.put(&listing.cipher_key(folder), locked)?;
        Ok(())
    }

    /// Undo a half-finished publish. Missing blobs are expected here.
    fn rollback_publish(&self, listing: &Listing) {
        let folder = &self.config.storage.folder;
        for key in [listing.image_key(folder), listing.cipher_key(folder)] {
            if let Err(e) = self.objects.delete(&key) {
                tracing::debug!(key = %key, "Nothing to roll back: {}", e);
            }
        }
        if let Err(e) = self.ledger.withdraw(&listing.asset) {
            tracing::warn!(asset = %listing.asset, "Failed to withdraw after publish error: {}", e);
        }
        tracing::warn!(asset = %listing.asset, "Rolled back publish");
    }

    /// Load `party`'s keys, failing unless they own `asset` right now
    fn owner_keys(&self, asset: &AssetId, party: &PartyId) -> Result<Keypair> {
        let owner: PublicKey = self.ledger.record(asset)?.owner()?;
        let not_owner = || EnftError::NotOwner {
            party: party.to_string(),
            asset: asset.to_string(),
        };

        let record = self.identities.lookup(party)?.ok_or_else(not_owner)?;
        let keys = Keypair::from_record(&record)?;
        if *keys.public() != owner {
            return Err(not_owner());
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_transfer;
    use crate::market::{AssetRecord, MemoryIdentityStore, MemoryLedger, MemoryObjectStore};
    use crate::obfuscation::REDACTED;
    use image::{Rgba, RgbaImage};

    type TestRelay = Relay<MemoryIdentityStore, MemoryObjectStore, MemoryLedger>;

    fn relay() -> TestRelay {
        Relay::new(
            MemoryIdentityStore::new(),
            MemoryObjectStore::default(),
            MemoryLedger::new(),
            EnftConfig::default(),
        )
    }

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 13) as u8, (y * 7) as u8, ((x + y) * 3) as u8, 255])
        })
    }

    fn png(image: &RgbaImage) -> Vec<u8> {
        encode_png(image).unwrap()
    }

    #[test]
    fn test_publish_stores_redacted_image_and_cipher() {
        let relay = relay();
        let original = gradient(20, 20);
        let seller = PartyId::new("alice");

        let listing = relay
            .publish(&seller, "sunset", &png(&original), StrategyKind::Cross)
            .unwrap();
        assert!(listing.masked > 0);
        assert_eq!(relay.objects().len().unwrap(), 2);
        assert!(listing.image_url.ends_with(&format!("enft/{}", listing.asset)));
        assert!(listing.cipher_url.ends_with("_ciphertext"));

        let stored = decode_image(
            &relay
                .objects()
                .get(&format!("enft/{}", listing.asset))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(*stored.get_pixel(10, 10), REDACTED);
        assert_ne!(stored, original);

        let record = relay.ledger().record(&listing.asset).unwrap();
        let seller_keys = relay.identities().get_or_create(&seller).unwrap();
        assert_eq!(record.owner().unwrap(), *seller_keys.public());
    }

    #[test]
    fn test_seller_reveals_original() {
        let relay = relay();
        let original = gradient(12, 9);
        let seller = PartyId::new("alice");
        let listing = relay
            .publish(&seller, "grid", &png(&original), StrategyKind::Uniform)
            .unwrap();

        let revealed = decode_image(&relay.reveal(&listing.asset, &seller).unwrap()).unwrap();
        assert_eq!(revealed, original);
    }

    #[test]
    fn test_transfer_hands_over_reveal_rights() {
        let relay = relay();
        let original = gradient(16, 16);
        let alice = PartyId::new("alice");
        let bob = PartyId::new("bob");
        let listing = relay
            .publish(&alice, "sunset", &png(&original), StrategyKind::Cross)
            .unwrap();

        let receipt = relay.transfer(&listing.asset, &alice, &bob).unwrap();
        assert!(!receipt.replayed);
        assert!(verify_transfer(&receipt.bundle.statement, &receipt.bundle.proof));
        assert_eq!(receipt.bundle.statement.prev, listing.encrypted_secret);

        let revealed = decode_image(&relay.reveal(&listing.asset, &bob).unwrap()).unwrap();
        assert_eq!(revealed, original);

        assert!(matches!(
            relay.reveal(&listing.asset, &alice),
            Err(EnftError::NotOwner { .. })
        ));
    }

    #[test]
    fn test_third_party_cannot_reveal_or_transfer() {
        let relay = relay();
        let alice = PartyId::new("alice");
        let carol = PartyId::new("carol");
        let listing = relay
            .publish(&alice, "sunset", &png(&gradient(8, 8)), StrategyKind::EdgeDetection)
            .unwrap();
        relay.identities().get_or_create(&carol).unwrap();

        assert!(matches!(
            relay.reveal(&listing.asset, &carol),
            Err(EnftError::NotOwner { .. })
        ));
        assert!(matches!(
            relay.transfer(&listing.asset, &carol, &carol),
            Err(EnftError::NotOwner { .. })
        ));
        assert!(matches!(
            relay.reveal(&listing.asset, &PartyId::new("unknown")),
            Err(EnftError::NotOwner { .. })
        ));
    }

    #[test]
    fn test_cancel_removes_everything() {
        let relay = relay();
        let alice = PartyId::new("alice");
        let listing = relay
            .publish(&alice, "sunset", &png(&gradient(8, 8)), StrategyKind::RandomBlock)
            .unwrap();

        assert!(matches!(
            relay.cancel(&listing.asset, &PartyId::new("bob")),
            Err(EnftError::NotOwner { .. })
        ));

        relay.cancel(&listing.asset, &alice).unwrap();
        assert!(relay.objects().is_empty().unwrap());
        assert!(matches!(
            relay.listing(&listing.asset),
            Err(EnftError::AssetNotFound(_))
        ));
        assert!(matches!(
            relay.reveal(&listing.asset, &alice),
            Err(EnftError::AssetNotFound(_))
        ));
    }

    #[test]
    fn test_garbage_image_rejected() {
        let relay = relay();
        assert!(matches!(
            relay.publish(&PartyId::new("alice"), "bad", b"nope", StrategyKind::Cross),
            Err(EnftError::Image(_))
        ));
        assert!(relay.objects().is_empty().unwrap());
    }

    /// Ledger that refuses every registration, as if the id were taken
    struct RejectingLedger;

    impl Ledger for RejectingLedger {
        fn register(&self, asset: &AssetId, _: PublicKey, _: EncryptedSecret) -> Result<()> {
            Err(EnftError::AssetAlreadyExists(asset.to_string()))
        }

        fn submit_transfer(&self, asset: &AssetId, _: &TransferBundle) -> Result<TransferOutcome> {
            Err(EnftError::AssetNotFound(asset.to_string()))
        }

        fn record(&self, asset: &AssetId) -> Result<AssetRecord> {
            Err(EnftError::AssetNotFound(asset.to_string()))
        }

        fn withdraw(&self, asset: &AssetId) -> Result<()> {
            Err(EnftError::AssetNotFound(asset.to_string()))
        }
    }

    /// Object store whose ciphertext uploads fail
    #[derive(Default)]
    struct FailingCipherStore {
        inner: MemoryObjectStore,
    }

    impl ObjectStore for FailingCipherStore {
        fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
            if key.ends_with("_ciphertext") {
                return Err(EnftError::Storage("bucket unavailable".to_string()));
            }
            self.inner.put(key, bytes)
        }

        fn get(&self, key: &str) -> Result<Vec<u8>> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key)
        }
    }

    #[test]
    fn test_rejected_registration_stores_nothing() {
        let relay = Relay::new(
            MemoryIdentityStore::new(),
            MemoryObjectStore::default(),
            RejectingLedger,
            EnftConfig::default(),
        );

        let result = relay.publish(
            &PartyId::new("alice"),
            "x",
            &png(&gradient(8, 8)),
            StrategyKind::Cross,
        );
        assert!(matches!(result, Err(EnftError::AssetAlreadyExists(_))));
        assert_eq!(relay.objects().len().unwrap(), 0);
    }

    #[test]
    fn test_failed_upload_rolls_back_publish() {
        let relay = Relay::new(
            MemoryIdentityStore::new(),
            FailingCipherStore::default(),
            MemoryLedger::new(),
            EnftConfig::default(),
        );

        let result = relay.publish(
            &PartyId::new("alice"),
            "x",
            &png(&gradient(8, 8)),
            StrategyKind::Cross,
        );
        assert!(matches!(result, Err(EnftError::Storage(_))));
        assert!(relay.objects().inner.is_empty().unwrap());
        assert!(relay.listings().unwrap().is_empty());
    }

    #[test]
    fn test_repeated_publish_keeps_both_assets() {
        let relay = relay();
        let alice = PartyId::new("alice");
        let first_image = gradient(8, 8);
        let second_image = gradient(9, 9);

        let first = relay
            .publish(&alice, "same", &png(&first_image), StrategyKind::Cross)
            .unwrap();
        let second = relay
            .publish(&alice, "same", &png(&second_image), StrategyKind::Cross)
            .unwrap();
        assert_ne!(first.asset, second.asset);
        assert_eq!(relay.objects().len().unwrap(), 4);

        let revealed = decode_image(&relay.reveal(&first.asset, &alice).unwrap()).unwrap();
        assert_eq!(revealed, first_image);
    }
}
