//! Internal fiat ledger
//!
//! Fiat balances live in a ledger owned by the surrounding service (mobile-money
//! ramp, accounting). This crate only reads and moves them through [`FiatLedger`].

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::WalletError;

/// Fiat balances in minor units (cents), keyed by wallet id
#[async_trait]
pub trait FiatLedger: Send + Sync {
    async fn balance(&self, wallet_id: &str) -> Result<u64, WalletError>;

    /// Add `amount` and return the new balance
    async fn credit(&self, wallet_id: &str, amount: u64) -> Result<u64, WalletError>;

    /// Remove `amount` and return the new balance. Never goes negative.
    async fn debit(&self, wallet_id: &str, amount: u64) -> Result<u64, WalletError>;
}

#[derive(Debug, Default)]
pub struct InMemoryFiatLedger {
    balances: RwLock<HashMap<String, u64>>,
}

impl InMemoryFiatLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FiatLedger for InMemoryFiatLedger {
    async fn balance(&self, wallet_id: &str) -> Result<u64, WalletError> {
        Ok(self
            .balances
            .read()
            .await
            .get(wallet_id)
            .copied()
            .unwrap_or(0))
    }

    async fn credit(&self, wallet_id: &str, amount: u64) -> Result<u64, WalletError> {
        let mut balances = self.balances.write().await;
        let balance = balances.entry(wallet_id.to_string()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| WalletError::InvalidInput("Fiat balance overflow".into()))?;
        Ok(*balance)
    }

    async fn debit(&self, wallet_id: &str, amount: u64) -> Result<u64, WalletError> {
        let mut balances = self.balances.write().await;
        let current = balances.get(wallet_id).copied().unwrap_or(0);
        let remaining = current.checked_sub(amount).ok_or_else(|| {
            WalletError::InsufficientFunds(format!(
                "fiat balance {} is below {}",
                current, amount
            ))
        })?;
        balances.insert(wallet_id.to_string(), remaining);
        Ok(remaining)
    }
}
