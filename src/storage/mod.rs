//! Wallet record persistence
//!
//! - JSON file store (one directory per phone number)
//! - In-memory store for tests and embedding
//! - Record model

mod file_system;
mod memory;
mod models;

pub use file_system::FileStore;
pub use memory::MemoryStore;
pub use models::WalletRecord;

use crate::error::StorageError;

/// Keyed store of wallet records, addressed by phone number
pub trait WalletStore: Send + Sync {
    /// Check if a wallet is recorded for `phone_number`
    fn exists(&self, phone_number: &str) -> Result<bool, StorageError>;

    /// Insert or overwrite the record for `record.phone_number`
    fn save(&self, record: &WalletRecord) -> Result<(), StorageError>;

    /// Insert the record only if none exists for its phone number.
    ///
    /// Atomic with respect to other writers: exactly one of several concurrent
    /// inserts for the same phone succeeds, the rest get `StorageError::AlreadyExists`.
    fn insert_new(&self, record: &WalletRecord) -> Result<(), StorageError>;

    /// Load the record for `phone_number`, `StorageError::NotFound` if absent
    fn load(&self, phone_number: &str) -> Result<WalletRecord, StorageError>;

    /// Phone numbers of every stored wallet
    fn list(&self) -> Result<Vec<String>, StorageError>;

    fn delete(&self, phone_number: &str) -> Result<(), StorageError>;
}
