//! Balance aggregation across on-chain ledgers, the channel node and the fiat ledger
//!
//! Every source is queried concurrently and independently. A failing source is
//! logged and reported as absent; the snapshot itself never fails.

use futures::join;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::bitcoin::BitcoinLedger;
use crate::cardano::CardanoLedger;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::fiat::FiatLedger;
use crate::keys::WalletIdentity;
use crate::lightning::ChannelNode;
use crate::types::{lovelace_to_ada, sats_to_btc};

/// Minor units per fiat unit in the fiat ledger
pub const FIAT_MINOR_UNITS: u64 = 100;

/// Fixed display conversion rates, fiat units per coin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeRates {
    pub ada: f64,
    /// Without a BTC rate the Bitcoin and channel balances are left out of the fiat figure
    pub btc: Option<f64>,
}

impl ExchangeRates {
    pub fn from_config(config: &WalletConfig) -> Self {
        Self {
            ada: config.ada_fiat_rate,
            btc: config.btc_fiat_rate,
        }
    }
}

/// One fresh view of a wallet's holdings. `None` marks a source that could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub wallet_id: String,
    pub bitcoin_sats: Option<u64>,
    pub cardano_lovelace: Option<u64>,
    pub channel_sats: Option<u64>,
    /// Fiat ledger balance in minor units
    pub fiat_ledger: Option<u64>,
    /// Approximate total in fiat units over every source that answered
    pub fiat_equivalent: f64,
}

impl BalanceSnapshot {
    /// Whether any source failed to answer
    pub fn is_partial(&self) -> bool {
        self.bitcoin_sats.is_none()
            || self.cardano_lovelace.is_none()
            || self.channel_sats.is_none()
            || self.fiat_ledger.is_none()
    }
}

#[derive(Clone)]
pub struct BalanceAggregator {
    bitcoin: Arc<dyn BitcoinLedger>,
    cardano: Arc<dyn CardanoLedger>,
    channel: Arc<dyn ChannelNode>,
    fiat: Arc<dyn FiatLedger>,
    rates: ExchangeRates,
}

impl BalanceAggregator {
    pub fn new(
        bitcoin: Arc<dyn BitcoinLedger>,
        cardano: Arc<dyn CardanoLedger>,
        channel: Arc<dyn ChannelNode>,
        fiat: Arc<dyn FiatLedger>,
        rates: ExchangeRates,
    ) -> Self {
        Self {
            bitcoin,
            cardano,
            channel,
            fiat,
            rates,
        }
    }

    pub fn rates(&self) -> ExchangeRates {
        self.rates
    }

    pub async fn get_balance(&self, identity: &WalletIdentity) -> BalanceSnapshot {
        let (bitcoin, cardano, channel, fiat) = join!(
            self.bitcoin.address_balance(&identity.bitcoin.address),
            self.cardano.address_balance(&identity.cardano.payment_address),
            self.channel.balance(),
            self.fiat.balance(&identity.wallet_id),
        );

        let snapshot = BalanceSnapshot {
            wallet_id: identity.wallet_id.clone(),
            bitcoin_sats: degrade("bitcoin", bitcoin),
            cardano_lovelace: degrade("cardano", cardano),
            channel_sats: degrade("channel", channel),
            fiat_ledger: degrade("fiat ledger", fiat),
            fiat_equivalent: 0.0,
        };

        let fiat_equivalent = fiat_equivalent(&snapshot, self.rates);
        log::info!(
            "Balance for {}: btc={:?} ada={:?} channel={:?} fiat={:?} (~{:.2})",
            identity.wallet_id,
            snapshot.bitcoin_sats,
            snapshot.cardano_lovelace,
            snapshot.channel_sats,
            snapshot.fiat_ledger,
            fiat_equivalent
        );

        BalanceSnapshot {
            fiat_equivalent,
            ..snapshot
        }
    }
}

fn degrade(source: &str, result: Result<u64, WalletError>) -> Option<u64> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("{} balance unavailable: {}", source, e);
            None
        }
    }
}

/// ADA at the ADA rate, on-chain plus channel sats at the BTC rate, plus the fiat ledger
pub fn fiat_equivalent(snapshot: &BalanceSnapshot, rates: ExchangeRates) -> f64 {
    let mut total = lovelace_to_ada(snapshot.cardano_lovelace.unwrap_or(0)) * rates.ada;

    if let Some(btc_rate) = rates.btc {
        let sats = snapshot.bitcoin_sats.unwrap_or(0) + snapshot.channel_sats.unwrap_or(0);
        total += sats_to_btc(sats) * btc_rate;
    }

    total + snapshot.fiat_ledger.unwrap_or(0) as f64 / FIAT_MINOR_UNITS as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> BalanceSnapshot {
        BalanceSnapshot {
            wallet_id: "wallet_1".into(),
            bitcoin_sats: Some(50_000_000),
            cardano_lovelace: Some(10_000_000),
            channel_sats: Some(50_000_000),
            fiat_ledger: Some(2_550),
            fiat_equivalent: 0.0,
        }
    }

    #[test]
    fn test_fiat_equivalent_with_btc_rate() {
        let rates = ExchangeRates {
            ada: 71.53,
            btc: Some(1_000.0),
        };
        let total = fiat_equivalent(&snapshot(), rates);
        assert!((total - (715.3 + 1_000.0 + 25.5)).abs() < 1e-9);
    }

    #[test]
    fn test_fiat_equivalent_without_btc_rate() {
        let rates = ExchangeRates {
            ada: 71.53,
            btc: None,
        };
        let total = fiat_equivalent(&snapshot(), rates);
        assert!((total - (715.3 + 25.5)).abs() < 1e-9);
    }

    #[test]
    fn test_absent_sources_count_as_zero() {
        let mut partial = snapshot();
        partial.cardano_lovelace = None;
        partial.fiat_ledger = None;
        assert!(partial.is_partial());

        let rates = ExchangeRates {
            ada: 71.53,
            btc: Some(1_000.0),
        };
        assert!((fiat_equivalent(&partial, rates) - 1_000.0).abs() < 1e-9);
        assert!(!snapshot().is_partial());
    }
}
