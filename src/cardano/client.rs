use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;
use crate::http::ensure_success;

const LOVELACE_UNIT: &str = "lovelace";
const PAGE_SIZE: usize = 100;

/// Unspent output at a payment address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoUtxo {
    pub tx_hash: String,
    pub output_index: u32,
    pub lovelace: u64,
    /// Output also holds native tokens
    pub has_assets: bool,
}

/// Fee and deposit parameters of the current epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolParameters {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub key_deposit: u64,
}

impl ProtocolParameters {
    /// Linear fee for a transaction of `size` bytes, `None` past the integer range
    pub fn min_fee(&self, size: u64) -> Option<u64> {
        self.min_fee_a.checked_mul(size)?.checked_add(self.min_fee_b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochInfo {
    pub epoch: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Reward account state of a stake address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeAccount {
    pub stake_address: String,
    pub active: bool,
    pub controlled_amount: u64,
    pub rewards_sum: u64,
    pub withdrawable_amount: u64,
    pub pool_id: Option<String>,
}

/// Read and submit access to a Cardano indexer
#[async_trait]
pub trait CardanoLedger: Send + Sync {
    /// All unspent outputs at `address`, across every page
    async fn list_utxos(&self, address: &str) -> Result<Vec<CardanoUtxo>, WalletError>;

    /// Lovelace held by `address`; unknown addresses hold nothing
    async fn address_balance(&self, address: &str) -> Result<u64, WalletError>;

    async fn protocol_parameters(&self) -> Result<ProtocolParameters, WalletError>;

    async fn tip_slot(&self) -> Result<u64, WalletError>;

    async fn latest_epoch(&self) -> Result<EpochInfo, WalletError>;

    /// `None` when the stake address has never appeared on chain
    async fn account(&self, stake_address: &str) -> Result<Option<StakeAccount>, WalletError>;

    /// Submit a signed transaction, returning the id the ledger assigned
    async fn submit(&self, tx_cbor: &[u8]) -> Result<String, WalletError>;
}

#[derive(Debug, Deserialize)]
struct AmountEntry {
    unit: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct AddressResponse {
    amount: Vec<AmountEntry>,
}

#[derive(Debug, Deserialize)]
struct UtxoResponse {
    tx_hash: String,
    output_index: u32,
    amount: Vec<AmountEntry>,
}

#[derive(Debug, Deserialize)]
struct ParametersResponse {
    min_fee_a: u64,
    min_fee_b: u64,
    key_deposit: String,
}

#[derive(Debug, Deserialize)]
struct EpochResponse {
    epoch: u64,
    start_time: i64,
    end_time: i64,
}

#[derive(Debug, Deserialize)]
struct BlockResponse {
    hash: Option<String>,
    slot: Option<u64>,
}

impl BlockResponse {
    /// Epoch-boundary blocks carry no slot; a tip without one cannot anchor a TTL
    fn tip_slot(&self) -> Result<u64, WalletError> {
        self.slot.ok_or_else(|| {
            WalletError::InvalidResponse(format!(
                "latest block {} has no slot",
                self.hash.as_deref().unwrap_or("<unknown>")
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    stake_address: String,
    active: bool,
    controlled_amount: String,
    rewards_sum: String,
    withdrawable_amount: String,
    pool_id: Option<String>,
}

fn quantity(raw: &str, field: &str) -> Result<u64, WalletError> {
    raw.parse()
        .map_err(|_| WalletError::InvalidResponse(format!("{} is not an amount: {}", field, raw)))
}

fn lovelace_of(amounts: &[AmountEntry]) -> Result<u64, WalletError> {
    amounts
        .iter()
        .find(|a| a.unit == LOVELACE_UNIT)
        .map(|a| quantity(&a.quantity, "lovelace"))
        .unwrap_or(Ok(0))
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, WalletError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| WalletError::InvalidResponse(format!("invalid timestamp {}", secs)))
}

/// Blockfrost API client
pub struct BlockfrostClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
}

impl BlockfrostClient {
    pub fn new(base_url: &str, project_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
        }
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, WalletError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("GET {}", url);

        Ok(self
            .client
            .get(&url)
            .header("project_id", &self.project_id)
            .send()
            .await?)
    }

    /// GET that maps 404 to `None`
    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, WalletError> {
        let response = self.get(path).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(ensure_success(response, path).await?.json().await?))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, WalletError> {
        let response = self.get(path).await?;
        Ok(ensure_success(response, path).await?.json().await?)
    }
}

#[async_trait]
impl CardanoLedger for BlockfrostClient {
    async fn list_utxos(&self, address: &str) -> Result<Vec<CardanoUtxo>, WalletError> {
        let mut utxos = Vec::new();
        let mut page = 1;

        loop {
            let path = format!("/addresses/{}/utxos?page={}", address, page);
            let Some(batch) = self.get_optional::<Vec<UtxoResponse>>(&path).await? else {
                break;
            };
            let batch_len = batch.len();

            for utxo in batch {
                utxos.push(CardanoUtxo {
                    lovelace: lovelace_of(&utxo.amount)?,
                    has_assets: utxo.amount.iter().any(|a| a.unit != LOVELACE_UNIT),
                    tx_hash: utxo.tx_hash,
                    output_index: utxo.output_index,
                });
            }

            if batch_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        log::debug!("{} holds {} utxos", address, utxos.len());
        Ok(utxos)
    }

    async fn address_balance(&self, address: &str) -> Result<u64, WalletError> {
        match self
            .get_optional::<AddressResponse>(&format!("/addresses/{}", address))
            .await?
        {
            Some(info) => lovelace_of(&info.amount),
            None => Ok(0),
        }
    }

    async fn protocol_parameters(&self) -> Result<ProtocolParameters, WalletError> {
        let params: ParametersResponse = self.get_json("/epochs/latest/parameters").await?;

        Ok(ProtocolParameters {
            min_fee_a: params.min_fee_a,
            min_fee_b: params.min_fee_b,
            key_deposit: quantity(&params.key_deposit, "key_deposit")?,
        })
    }

    async fn tip_slot(&self) -> Result<u64, WalletError> {
        let block: BlockResponse = self.get_json("/blocks/latest").await?;
        block.tip_slot()
    }

    async fn latest_epoch(&self) -> Result<EpochInfo, WalletError> {
        let epoch: EpochResponse = self.get_json("/epochs/latest").await?;

        Ok(EpochInfo {
            epoch: epoch.epoch,
            start_time: timestamp(epoch.start_time)?,
            end_time: timestamp(epoch.end_time)?,
        })
    }

    async fn account(&self, stake_address: &str) -> Result<Option<StakeAccount>, WalletError> {
        let Some(account) = self
            .get_optional::<AccountResponse>(&format!("/accounts/{}", stake_address))
            .await?
        else {
            return Ok(None);
        };

        Ok(Some(StakeAccount {
            stake_address: account.stake_address,
            active: account.active,
            controlled_amount: quantity(&account.controlled_amount, "controlled_amount")?,
            rewards_sum: quantity(&account.rewards_sum, "rewards_sum")?,
            withdrawable_amount: quantity(&account.withdrawable_amount, "withdrawable_amount")?,
            pool_id: account.pool_id,
        }))
    }

    async fn submit(&self, tx_cbor: &[u8]) -> Result<String, WalletError> {
        let url = format!("{}/tx/submit", self.base_url);
        log::debug!("Submitting {} byte transaction to: {}", tx_cbor.len(), url);

        let response = self
            .client
            .post(&url)
            .header("project_id", &self.project_id)
            .header(reqwest::header::CONTENT_TYPE, "application/cbor")
            .body(tx_cbor.to_vec())
            .send()
            .await?;

        let tx_id: String = ensure_success(response, "submit").await?.json().await?;
        Ok(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_fee() {
        let params = ProtocolParameters {
            min_fee_a: 44,
            min_fee_b: 155_381,
            key_deposit: 2_000_000,
        };
        assert_eq!(params.min_fee(300), Some(44 * 300 + 155_381));

        let hostile = ProtocolParameters {
            min_fee_a: u64::MAX,
            ..params
        };
        assert_eq!(hostile.min_fee(2), None);
    }

    #[test]
    fn test_tip_without_slot_is_invalid_response() {
        let block: BlockResponse = serde_json::from_str(r#"{"hash":"ab12","slot":null}"#).unwrap();
        let err = block.tip_slot().unwrap_err();
        assert!(matches!(err, WalletError::InvalidResponse(_)));
        assert!(err.to_string().contains("ab12"));

        let block: BlockResponse = serde_json::from_str(r#"{"slot":50000000,"height":9}"#).unwrap();
        assert_eq!(block.tip_slot().unwrap(), 50_000_000);
    }

    #[test]
    fn test_lovelace_ignores_tokens() {
        let amounts: Vec<AmountEntry> = serde_json::from_str(
            r#"[{"unit":"lovelace","quantity":"4200000"},{"unit":"abcd","quantity":"7"}]"#,
        )
        .unwrap();
        assert_eq!(lovelace_of(&amounts).unwrap(), 4_200_000);
        assert_eq!(lovelace_of(&[]).unwrap(), 0);
    }

    #[test]
    fn test_account_schema() {
        let json = r#"{"stake_address":"stake_test1xyz","active":true,"active_epoch":4,
            "controlled_amount":"1000","rewards_sum":"50","withdrawals_sum":"0",
            "reserves_sum":"0","treasury_sum":"0","withdrawable_amount":"50","pool_id":null}"#;
        let account: AccountResponse = serde_json::from_str(json).unwrap();
        assert!(account.active);
        assert_eq!(account.withdrawable_amount, "50");
        assert!(account.pool_id.is_none());
    }

    #[test]
    fn test_bad_quantity_is_invalid_response() {
        assert!(matches!(
            quantity("lots", "rewards_sum"),
            Err(WalletError::InvalidResponse(_))
        ));
    }
}
