//! Wallet Service Tests
//!
//! Provisioning, persistence and reload of phone-number wallets on the file
//! store. No ledger traffic is needed, so the clients point at an unused port.
//!
//! Run with: cargo test --test wallet_service_test -- --nocapture

mod common;

use common::*;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use ussd_wallet_core::{
    FileStore, StorageError, WalletError, WalletRecord, WalletService, WalletStore,
};

/// File store whose existence check holds both callers until each has looked
struct LockstepStore {
    inner: FileStore,
    barrier: Barrier,
}

impl WalletStore for LockstepStore {
    fn exists(&self, phone_number: &str) -> Result<bool, StorageError> {
        let exists = self.inner.exists(phone_number)?;
        self.barrier.wait();
        Ok(exists)
    }

    fn save(&self, record: &WalletRecord) -> Result<(), StorageError> {
        self.inner.save(record)
    }

    fn insert_new(&self, record: &WalletRecord) -> Result<(), StorageError> {
        self.inner.insert_new(record)
    }

    fn load(&self, phone_number: &str) -> Result<WalletRecord, StorageError> {
        self.inner.load(phone_number)
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        self.inner.list()
    }

    fn delete(&self, phone_number: &str) -> Result<(), StorageError> {
        self.inner.delete(phone_number)
    }
}

fn file_service(dir: &Path) -> WalletService {
    init_logger();
    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();
    WalletService::new_with_store(
        mock_config(addr),
        Arc::new(FileStore::new_with_base_dir(dir.to_path_buf())),
    )
}

#[test]
fn test_wallet_survives_restart() -> anyhow::Result<()> {
    let dir = TempDir::new()?;

    let created = file_service(dir.path()).create_wallet(PHONE)?;
    assert!(created.bitcoin_address.starts_with("tb1q"));
    assert!(created.cardano_payment_address.starts_with("addr_test1"));
    assert!(created.cardano_stake_address.starts_with("stake_test1"));

    // a fresh instance reads the same wallet back from disk
    let service = file_service(dir.path());
    assert!(service.wallet_exists(PHONE)?);
    assert_eq!(service.addresses(PHONE)?, created);

    let identity = service.load_identity(PHONE)?;
    assert_eq!(identity.addresses(), created);
    Ok(())
}

#[test]
fn test_wallets_are_independent() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let service = file_service(dir.path());

    let first = service.create_wallet(PHONE)?;
    let second = service.create_wallet(OTHER_PHONE)?;

    assert_ne!(first.wallet_id, second.wallet_id);
    assert_ne!(first.bitcoin_address, second.bitcoin_address);
    assert_ne!(first.cardano_payment_address, second.cardano_payment_address);

    let mut expected = vec![PHONE.to_string(), OTHER_PHONE.to_string()];
    expected.sort();
    assert_eq!(service.list_wallets()?, expected);
    Ok(())
}

#[test]
fn test_duplicate_wallet_is_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let service = file_service(dir.path());
    let original = service.create_wallet(PHONE)?;

    let err = service.create_wallet(PHONE).unwrap_err();
    assert!(matches!(err, WalletError::WalletExists(_)));

    // the first wallet is untouched
    assert_eq!(service.addresses(PHONE)?, original);
    Ok(())
}

#[test]
fn test_concurrent_creates_keep_one_mnemonic() -> anyhow::Result<()> {
    init_logger();
    let dir = TempDir::new()?;
    let store = Arc::new(LockstepStore {
        inner: FileStore::new_with_base_dir(dir.path().to_path_buf()),
        barrier: Barrier::new(2),
    });
    let addr: SocketAddr = "127.0.0.1:9".parse()?;
    let service = WalletService::new_with_store(mock_config(addr), store.clone());

    // both callers pass the existence check before either writes
    let shared = &service;
    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| scope.spawn(move || shared.create_wallet(PHONE)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let created: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(created.len(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(WalletError::WalletExists(_)))));

    // the winner's addresses are the ones on disk
    assert_eq!(&service.addresses(PHONE)?, created[0]);
    assert_eq!(service.load_identity(PHONE)?.addresses(), *created[0]);
    Ok(())
}

#[test]
fn test_invalid_phone_numbers() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let service = file_service(dir.path());

    for phone in ["254712345678", "+2547", "+25471234567890123", "+2547abc45678", ""] {
        let err = service.create_wallet(phone).unwrap_err();
        assert!(
            matches!(err, WalletError::InvalidInput(_)),
            "{:?} gave {:?}",
            phone,
            err
        );
    }
    assert!(service.list_wallets()?.is_empty());
    Ok(())
}

#[test]
fn test_delete_wallet() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let service = file_service(dir.path());
    service.create_wallet(PHONE)?;

    service.delete_wallet(PHONE)?;

    assert!(!service.wallet_exists(PHONE)?);
    assert!(matches!(
        service.delete_wallet(PHONE).unwrap_err(),
        WalletError::WalletNotFound(_)
    ));
    assert!(matches!(
        service.load_identity(PHONE).unwrap_err(),
        WalletError::WalletNotFound(_)
    ));
    Ok(())
}

#[test]
fn test_tampered_record_fails_to_load() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let service = file_service(dir.path());
    service.create_wallet(PHONE)?;

    let store = FileStore::new_with_base_dir(dir.path().to_path_buf());
    let mut record = store.load(PHONE)?;
    record.bitcoin_address = EXTERNAL_BTC_ADDRESS.to_string();
    store.save(&record)?;

    let err = service.load_identity(PHONE).unwrap_err();
    assert!(matches!(err, WalletError::Derivation(_)));
    Ok(())
}

#[tokio::test]
async fn test_operations_on_missing_wallet_fail_cleanly() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let service = file_service(dir.path());

    let result = service
        .send_bitcoin(PHONE, EXTERNAL_BTC_ADDRESS, 10_000, None)
        .await;
    assert!(result.failure_reason().unwrap().contains("Wallet not found"));

    let result = service.withdraw_rewards(PHONE).await;
    assert!(result.failure_reason().unwrap().contains("Wallet not found"));
    Ok(())
}
