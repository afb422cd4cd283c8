//! Data models for wallet storage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keys::{WalletAddresses, WalletIdentity};

/// Everything needed to restore a user's identity
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletRecord {
    pub wallet_id: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub bitcoin_network: String,
    pub cardano_network: String,
    pub bitcoin_mnemonic: String,
    pub cardano_mnemonic: String,
    pub bitcoin_address: String,
    pub bitcoin_public_key: String,
    pub cardano_payment_address: String,
    pub cardano_stake_address: String,
}

impl WalletRecord {
    pub fn new(phone_number: &str, identity: &WalletIdentity) -> Self {
        Self {
            wallet_id: identity.wallet_id.clone(),
            phone_number: phone_number.to_string(),
            created_at: Utc::now(),
            bitcoin_network: identity.bitcoin.network.to_string(),
            cardano_network: format!("{:?}", identity.cardano.network).to_lowercase(),
            bitcoin_mnemonic: identity.bitcoin.mnemonic_phrase(),
            cardano_mnemonic: identity.cardano.mnemonic_phrase(),
            bitcoin_address: identity.bitcoin.address.clone(),
            bitcoin_public_key: identity.bitcoin.public_key.clone(),
            cardano_payment_address: identity.cardano.payment_address.clone(),
            cardano_stake_address: identity.cardano.stake_address.clone(),
        }
    }

    /// Addresses as recorded at creation time
    pub fn addresses(&self) -> WalletAddresses {
        WalletAddresses {
            wallet_id: self.wallet_id.clone(),
            bitcoin_address: self.bitcoin_address.clone(),
            bitcoin_public_key: self.bitcoin_public_key.clone(),
            cardano_payment_address: self.cardano_payment_address.clone(),
            cardano_stake_address: self.cardano_stake_address.clone(),
        }
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("wallet_id", &self.wallet_id)
            .field("phone_number", &self.phone_number)
            .field("created_at", &self.created_at)
            .field("bitcoin_address", &self.bitcoin_address)
            .field("cardano_payment_address", &self.cardano_payment_address)
            .finish_non_exhaustive()
    }
}
