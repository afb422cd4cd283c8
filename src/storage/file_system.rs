use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use super::models::WalletRecord;
use super::WalletStore;
use crate::error::StorageError;

const RECORD_FILE: &str = "wallet.json";

/// One directory per phone number holding a pretty-printed JSON record
#[derive(Clone, Debug)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the default base directory ("./wallets")
    pub fn new() -> Self {
        Self {
            base_path: PathBuf::from("./wallets"),
        }
    }

    /// Create a store with a custom base directory (for testing)
    pub fn new_with_base_dir(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_path
    }

    /// Directory name for a phone number: its digits, without the leading '+'
    fn wallet_dir(&self, phone_number: &str) -> Result<PathBuf, StorageError> {
        let digits = phone_number.strip_prefix('+').unwrap_or(phone_number);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(StorageError::NotFound(format!(
                "invalid phone number key {:?}",
                phone_number
            )));
        }
        Ok(self.base_path.join(digits))
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletStore for FileStore {
    fn exists(&self, phone_number: &str) -> Result<bool, StorageError> {
        Ok(self.wallet_dir(phone_number)?.join(RECORD_FILE).exists())
    }

    fn save(&self, record: &WalletRecord) -> Result<(), StorageError> {
        let wallet_dir = self.wallet_dir(&record.phone_number)?;
        fs::create_dir_all(&wallet_dir)?;

        let json = serde_json::to_string_pretty(record)?;
        fs::write(wallet_dir.join(RECORD_FILE), json)?;
        log::debug!("Saved wallet {} to {:?}", record.wallet_id, wallet_dir);
        Ok(())
    }

    fn insert_new(&self, record: &WalletRecord) -> Result<(), StorageError> {
        let wallet_dir = self.wallet_dir(&record.phone_number)?;
        fs::create_dir_all(&wallet_dir)?;

        let json = serde_json::to_string_pretty(record)?;
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(wallet_dir.join(RECORD_FILE))
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(record.phone_number.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        log::debug!("Created wallet {} in {:?}", record.wallet_id, wallet_dir);
        Ok(())
    }

    fn load(&self, phone_number: &str) -> Result<WalletRecord, StorageError> {
        let path = self.wallet_dir(phone_number)?.join(RECORD_FILE);
        if !path.exists() {
            return Err(StorageError::NotFound(phone_number.to_string()));
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut phones = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if !path.join(RECORD_FILE).is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                phones.push(format!("+{}", name));
            }
        }
        phones.sort();
        Ok(phones)
    }

    fn delete(&self, phone_number: &str) -> Result<(), StorageError> {
        let wallet_dir = self.wallet_dir(phone_number)?;
        if !wallet_dir.exists() {
            return Err(StorageError::NotFound(phone_number.to_string()));
        }

        log::warn!("Deleting wallet directory: {:?}", wallet_dir);
        fs::remove_dir_all(&wallet_dir)?;
        log::info!("Wallet for {} deleted", phone_number);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalletConfig;
    use crate::keys::KeyManager;
    use tempfile::TempDir;

    fn record(phone: &str) -> WalletRecord {
        let identity = KeyManager::new(&WalletConfig::default())
            .derive_wallet()
            .unwrap();
        WalletRecord::new(phone, &identity)
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(temp.path().to_path_buf());
        let saved = record("+254700000001");

        assert!(!store.exists("+254700000001").unwrap());
        store.save(&saved).unwrap();
        assert!(store.exists("+254700000001").unwrap());
        assert!(temp.path().join("254700000001").join(RECORD_FILE).is_file());

        let loaded = store.load("+254700000001").unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_missing_record() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(temp.path().to_path_buf());
        assert!(matches!(
            store.load("+15550000000"),
            Err(StorageError::NotFound(_))
        ));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_and_delete() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(temp.path().to_path_buf());
        store.save(&record("+254700000002")).unwrap();
        store.save(&record("+254700000001")).unwrap();
        fs::create_dir_all(temp.path().join("stray")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["+254700000001", "+254700000002"]);

        store.delete("+254700000001").unwrap();
        assert_eq!(store.list().unwrap(), vec!["+254700000002"]);
        assert!(store.delete("+254700000001").is_err());
    }

    #[test]
    fn test_insert_new_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new_with_base_dir(temp.path().to_path_buf());
        let first = record("+254700000003");
        let second = record("+254700000003");

        store.insert_new(&first).unwrap();
        assert!(matches!(
            store.insert_new(&second),
            Err(StorageError::AlreadyExists(_))
        ));
        assert_eq!(store.load("+254700000003").unwrap(), first);
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let store = FileStore::new_with_base_dir(PathBuf::from("/tmp/unused"));
        assert!(store.load("../etc").is_err());
    }
}
