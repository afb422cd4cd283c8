//! Cardano operations
//!
//! - Blockfrost access
//! - Shelley addresses and CBOR transaction encoding
//! - Transfers, delegation, reward withdrawal and deregistration

pub mod address;
pub mod cbor;
pub mod client;
pub mod send;
pub mod staking;
pub mod transaction;

pub use client::{
    BlockfrostClient, CardanoLedger, CardanoUtxo, EpochInfo, ProtocolParameters, StakeAccount,
};
pub use send::{send_ada, CardanoSubmission};
pub use staking::{delegate_stake, deregister_stake, stake_rewards, withdraw_rewards, StakeRewards};
pub use transaction::{CardanoTxBuilder, Certificate, SignedTransaction, TxIntent};
