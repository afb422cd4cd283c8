use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::models::WalletRecord;
use super::WalletStore;
use crate::error::StorageError;

/// Process-local store, keyed by phone number
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, WalletRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletStore for MemoryStore {
    fn exists(&self, phone_number: &str) -> Result<bool, StorageError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.contains_key(phone_number))
    }

    fn save(&self, record: &WalletRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.phone_number.clone(), record.clone());
        Ok(())
    }

    fn insert_new(&self, record: &WalletRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.entry(record.phone_number.clone()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(record.phone_number.clone())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    fn load(&self, phone_number: &str) -> Result<WalletRecord, StorageError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .get(phone_number)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(phone_number.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut phones: Vec<String> = records.keys().cloned().collect();
        phones.sort();
        Ok(phones)
    }

    fn delete(&self, phone_number: &str) -> Result<(), StorageError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records
            .remove(phone_number)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(phone_number.to_string()))
    }
}
