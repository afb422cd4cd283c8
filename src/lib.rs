//! USSD Wallet Core: phone-number wallets on Bitcoin, Lightning and Cardano
//!
//! This crate holds the transaction and balance logic behind a phone-menu wallet.
//! Each user gets one custodial identity per chain, derived from its own 24-word
//! mnemonic. Transactions are built, signed and broadcast locally against public
//! indexers, and balances are reconciled across chains into one snapshot.
//!
//! # Architecture
//!
//! - **Keys**: BIP84 P2WPKH for Bitcoin, ed25519 payment + stake keys for Cardano
//! - **Bitcoin**: Esplora / blockchain.info access, first-fit selection, P2WPKH signing
//! - **Cardano**: Blockfrost access, CBOR transaction bodies, staking certificates
//! - **Lightning**: LNbits-style node client for invoices, payments and channels
//! - **Balance**: concurrent aggregation with a fixed display conversion rate
//!
//! # Example
//!
//! ```ignore
//! use ussd_wallet_core::{WalletConfig, WalletService};
//!
//! let service = WalletService::new(WalletConfig::from_env()?);
//! let addresses = service.create_wallet("+254712345678")?;
//!
//! let result = service
//!     .send_bitcoin("+254712345678", "tb1q...", 70_000, None)
//!     .await;
//! if let Some(txid) = result.tx_hash() {
//!     println!("broadcast {}", txid);
//! }
//! ```

// Public modules
pub mod balance;
pub mod bitcoin;
pub mod cardano;
pub mod config;
pub mod error;
pub mod fiat;
mod http;
pub mod keys;
pub mod lightning;
pub mod manager;
pub mod storage;
pub mod types;

// Re-exports for convenience
pub use balance::{BalanceAggregator, BalanceSnapshot, ExchangeRates};
pub use config::{BitcoinIndexer, CardanoNetwork, WalletConfig};
pub use error::{StorageError, WalletError};
pub use fiat::{FiatLedger, InMemoryFiatLedger};
pub use keys::{BitcoinIdentity, CardanoIdentity, KeyManager, WalletAddresses, WalletIdentity};
pub use manager::WalletService;
pub use storage::{FileStore, MemoryStore, WalletRecord, WalletStore};
pub use types::{
    ada_to_lovelace, btc_to_sats, lovelace_to_ada, sats_to_btc, TransactionReceipt,
    TransactionResult,
};

// Common result type
pub type Result<T> = std::result::Result<T, WalletError>;
