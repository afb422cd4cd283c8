//! Bitcoin protocol operations
//!
//! - Indexer access (Esplora, blockchain.info)
//! - First-fit input selection and fee pricing
//! - P2WPKH signing and broadcast

pub mod client;
pub mod send;
pub mod transaction;

// Re-export main types
pub use client::{ledger_from_config, BitcoinLedger, BlockchainInfoClient, EsploraClient, Utxo};
pub use send::{broadcast_transaction, send_bitcoin, BitcoinTransfer};
pub use transaction::{TransactionBuilder, UtxoPlan, DUST_LIMIT};
