//! Identity and object storage interfaces, with in-memory implementations

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::crypto::{KeyRecord, Keypair};
use crate::error::{EnftError, Result};
use crate::types::PartyId;

/// Maps a party to its single long-lived keypair
pub trait IdentityStore {
    fn lookup(&self, party: &PartyId) -> Result<Option<KeyRecord>>;

    /// Return the party's keypair, generating and storing one on first use.
    /// An existing record is never replaced.
    fn get_or_create(&self, party: &PartyId) -> Result<Keypair>;
}

/// Blob storage addressed by string keys
pub trait ObjectStore {
    /// Store `bytes` under `key` and return the public url of the object
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String>;

    fn get(&self, key: &str) -> Result<Vec<u8>>;

    fn delete(&self, key: &str) -> Result<()>;
}

fn locked<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| EnftError::Storage("store lock poisoned".to_string()))
}

/// Identity store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: Mutex<HashMap<PartyId, KeyRecord>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an existing key for `party`. Fails if the party already has one.
    pub fn import(&self, party: &PartyId, keypair: &Keypair) -> Result<()> {
        let mut records = locked(&self.records)?;
        if records.contains_key(party) {
            return Err(EnftError::InvalidKey(format!(
                "party {} already has a key",
                party
            )));
        }
        records.insert(party.clone(), keypair.to_record());
        Ok(())
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn lookup(&self, party: &PartyId) -> Result<Option<KeyRecord>> {
        Ok(locked(&self.records)?.get(party).cloned())
    }

    fn get_or_create(&self, party: &PartyId) -> Result<Keypair> {
        let mut records = locked(&self.records)?;
        if let Some(record) = records.get(party) {
            return Keypair::from_record(record);
        }

        let keypair = Keypair::generate()?;
        records.insert(party.clone(), keypair.to_record());
        tracing::info!(
            party = %party,
            public_key = %keypair.public().fingerprint(),
            "Created identity"
        );
        Ok(keypair)
    }
}

/// Object store kept in process memory
#[derive(Debug)]
pub struct MemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(locked(&self.objects)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        if key.is_empty() {
            return Err(EnftError::Storage("object key must not be empty".to_string()));
        }
        locked(&self.objects)?.insert(key.to_string(), bytes);
        Ok(format!("{}/{}", self.base_url.trim_end_matches('/'), key))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        locked(&self.objects)?
            .get(key)
            .cloned()
            .ok_or_else(|| EnftError::ObjectNotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        locked(&self.objects)?
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| EnftError::ObjectNotFound(key.to_string()))
    }
}
