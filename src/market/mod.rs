//! Marketplace plumbing: identity and object stores, the ownership ledger
//! and the relay that drives them

pub mod ledger;
pub mod relay;
pub mod store;

pub use ledger::{AssetRecord, CiphertextEntry, Ledger, MemoryLedger, SecretState, TransferOutcome};
pub use relay::{Listing, Relay, TransferReceipt};
pub use store::{IdentityStore, MemoryIdentityStore, MemoryObjectStore, ObjectStore};
