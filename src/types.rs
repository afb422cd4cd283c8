//! Operation results and unit conversions

use serde::{Deserialize, Serialize};

use crate::error::WalletError;

pub const SATS_PER_BTC: u64 = 100_000_000;
pub const LOVELACE_PER_ADA: u64 = 1_000_000;

const BTC_DECIMALS: u32 = 8;
const ADA_DECIMALS: u32 = 6;

/// Identifiers produced by a successful operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// On-chain transaction id (transfer, staking, channel funding or closing)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_hash: Option<String>,
    /// Invoice that was paid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_request: Option<String>,
    /// Fee in the chain's smallest unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<u64>,
}

/// Outcome of every public wallet operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionResult {
    Success(TransactionReceipt),
    Failed { reason: String },
}

impl TransactionResult {
    pub fn transaction(tx_hash: impl Into<String>, fee: Option<u64>) -> Self {
        TransactionResult::Success(TransactionReceipt {
            tx_hash: Some(tx_hash.into()),
            fee,
            ..Default::default()
        })
    }

    pub fn payment(payment_hash: impl Into<String>, payment_request: impl Into<String>) -> Self {
        TransactionResult::Success(TransactionReceipt {
            payment_hash: Some(payment_hash.into()),
            payment_request: Some(payment_request.into()),
            ..Default::default()
        })
    }

    /// Collapse an operation result, logging the cause of a failure
    pub fn from_result(operation: &str, result: Result<TransactionReceipt, WalletError>) -> Self {
        match result {
            Ok(receipt) => TransactionResult::Success(receipt),
            Err(e) => {
                log::error!("{} failed: {}", operation, e);
                TransactionResult::Failed {
                    reason: format!("{} failed: {}", operation, e),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransactionResult::Success(_))
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            TransactionResult::Success(receipt) => receipt.tx_hash.as_deref(),
            TransactionResult::Failed { .. } => None,
        }
    }

    pub fn payment_hash(&self) -> Option<&str> {
        match self {
            TransactionResult::Success(receipt) => receipt.payment_hash.as_deref(),
            TransactionResult::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            TransactionResult::Success(_) => None,
            TransactionResult::Failed { reason } => Some(reason),
        }
    }
}

/// Parse a decimal amount into integer base units, truncating extra precision
pub fn parse_amount(input: &str, decimals: u32) -> Result<u64, WalletError> {
    let input = input.trim();
    let invalid = || WalletError::InvalidInput(format!("Invalid amount: {:?}", input));

    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (input, ""),
    };
    if (whole.is_empty() && fraction.is_empty())
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }

    let scale = 10u64.pow(decimals);
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };

    let kept = &fraction[..fraction.len().min(decimals as usize)];
    let fraction_units: u64 = if kept.is_empty() {
        0
    } else {
        let padding = decimals - kept.len() as u32;
        kept.parse::<u64>().map_err(|_| invalid())? * 10u64.pow(padding)
    };

    whole
        .checked_mul(scale)
        .and_then(|units| units.checked_add(fraction_units))
        .ok_or_else(invalid)
}

/// BTC amount to sats, rounding down
pub fn btc_to_sats(btc: f64) -> Result<u64, WalletError> {
    if !btc.is_finite() || btc < 0.0 {
        return Err(WalletError::InvalidInput(format!("Invalid amount: {}", btc)));
    }
    parse_amount(&btc.to_string(), BTC_DECIMALS)
}

pub fn sats_to_btc(sats: u64) -> f64 {
    sats as f64 / SATS_PER_BTC as f64
}

/// ADA amount to lovelace, rounding down
pub fn ada_to_lovelace(ada: f64) -> Result<u64, WalletError> {
    if !ada.is_finite() || ada < 0.0 {
        return Err(WalletError::InvalidInput(format!("Invalid amount: {}", ada)));
    }
    parse_amount(&ada.to_string(), ADA_DECIMALS)
}

pub fn lovelace_to_ada(lovelace: u64) -> f64 {
    lovelace as f64 / LOVELACE_PER_ADA as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_btc_floor() {
        assert_eq!(btc_to_sats(0.0007).unwrap(), 70_000);
        assert_eq!(btc_to_sats(1.0).unwrap(), SATS_PER_BTC);
        assert_eq!(btc_to_sats(0.123456789).unwrap(), 12_345_678);
        assert!(btc_to_sats(-1.0).is_err());
        assert!(btc_to_sats(f64::NAN).is_err());
    }

    #[test]
    fn test_ada_floor() {
        assert_eq!(ada_to_lovelace(2.5).unwrap(), 2_500_000);
        assert_eq!(ada_to_lovelace(0.0000019).unwrap(), 1);
    }

    #[test]
    fn test_parse_amount_forms() {
        assert_eq!(parse_amount("12", 6).unwrap(), 12_000_000);
        assert_eq!(parse_amount(".5", 6).unwrap(), 500_000);
        assert_eq!(parse_amount("3.", 6).unwrap(), 3_000_000);
        assert!(parse_amount("", 6).is_err());
        assert!(parse_amount(".", 6).is_err());
        assert!(parse_amount("1,5", 6).is_err());
        assert!(parse_amount("-1", 6).is_err());
        assert!(parse_amount("99999999999999999999", 8).is_err());
    }

    #[test]
    fn test_down_conversions() {
        assert_eq!(sats_to_btc(38_130), 0.0003813);
        assert_eq!(lovelace_to_ada(1_500_000), 1.5);
    }

    #[test]
    fn test_result_serialization() {
        let ok = TransactionResult::transaction("abcd", Some(1_870));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"status": "success", "tx_hash": "abcd", "fee": 1870})
        );

        let failed = TransactionResult::from_result(
            "Send",
            Err(WalletError::NoUtxos("tb1q".into())),
        );
        assert!(!failed.is_success());
        assert!(failed.failure_reason().unwrap().contains("No spendable outputs"));
        assert_eq!(failed.tx_hash(), None);
    }
}
