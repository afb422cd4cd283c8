use async_trait::async_trait;
use bitcoin::Transaction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{BitcoinIndexer, WalletConfig};
use crate::error::WalletError;
use crate::http::ensure_success;

/// Spendable output as reported by an indexer, in indexer order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    /// Locking script hex, when the indexer reports it
    pub script_pubkey: Option<String>,
}

/// Read and broadcast access to a Bitcoin indexer
#[async_trait]
pub trait BitcoinLedger: Send + Sync {
    async fn list_unspent(&self, address: &str) -> Result<Vec<Utxo>, WalletError>;

    /// Confirmed balance in sats
    async fn address_balance(&self, address: &str) -> Result<u64, WalletError>;

    async fn tip_height(&self) -> Result<u64, WalletError>;

    async fn raw_transaction(&self, txid: &str) -> Result<String, WalletError>;

    /// Submit a signed transaction, returning its txid
    async fn broadcast(&self, tx_hex: &str) -> Result<String, WalletError>;
}

/// Pick the indexer implementation for the configured network
pub fn ledger_from_config(config: &WalletConfig) -> Arc<dyn BitcoinLedger> {
    match config.bitcoin_indexer {
        BitcoinIndexer::Esplora => Arc::new(EsploraClient::new(&config.esplora_url)),
        BitcoinIndexer::BlockchainInfo => {
            Arc::new(BlockchainInfoClient::new(&config.blockchain_info_url))
        }
    }
}

/// Compute the txid of a serialized transaction
pub fn txid_of(tx_hex: &str) -> Result<String, WalletError> {
    let bytes = hex::decode(tx_hex).map_err(|e| WalletError::Bitcoin(e.to_string()))?;
    let tx: Transaction = bitcoin::consensus::deserialize(&bytes)
        .map_err(|e| WalletError::Bitcoin(format!("Invalid transaction: {}", e)))?;
    Ok(tx.compute_txid().to_string())
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
}

#[derive(Debug, Deserialize)]
struct EsploraAddress {
    chain_stats: EsploraStats,
}

#[derive(Debug, Deserialize)]
struct EsploraStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

/// Esplora (blockstream.info / mempool.space) client
pub struct EsploraClient {
    client: reqwest::Client,
    base_url: String,
}

impl EsploraClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BitcoinLedger for EsploraClient {
    async fn list_unspent(&self, address: &str) -> Result<Vec<Utxo>, WalletError> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let utxos: Vec<EsploraUtxo> = ensure_success(response, "utxo query").await?.json().await?;

        Ok(utxos
            .into_iter()
            .map(|u| Utxo {
                txid: u.txid,
                vout: u.vout,
                value: u.value,
                script_pubkey: None,
            })
            .collect())
    }

    async fn address_balance(&self, address: &str) -> Result<u64, WalletError> {
        let url = format!("{}/address/{}", self.base_url, address);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let info: EsploraAddress = ensure_success(response, "address query").await?.json().await?;

        Ok(info
            .chain_stats
            .funded_txo_sum
            .saturating_sub(info.chain_stats.spent_txo_sum))
    }

    async fn tip_height(&self) -> Result<u64, WalletError> {
        let url = format!("{}/blocks/tip/height", self.base_url);

        let response = self.client.get(&url).send().await?;
        let text = ensure_success(response, "tip height").await?.text().await?;

        text.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| WalletError::InvalidResponse(e.to_string()))
    }

    async fn raw_transaction(&self, txid: &str) -> Result<String, WalletError> {
        let url = format!("{}/tx/{}/hex", self.base_url, txid);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        Ok(ensure_success(response, "raw transaction")
            .await?
            .text()
            .await?
            .trim()
            .to_string())
    }

    async fn broadcast(&self, tx_hex: &str) -> Result<String, WalletError> {
        log::debug!("Broadcasting transaction to: {}/tx", self.base_url);

        let response = self
            .client
            .post(format!("{}/tx", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(tx_hex.to_string())
            .send()
            .await?;

        Ok(ensure_success(response, "broadcast")
            .await?
            .text()
            .await?
            .trim()
            .to_string())
    }
}

#[derive(Debug, Deserialize)]
struct BlockchainInfoUnspent {
    unspent_outputs: Vec<BlockchainInfoOutput>,
}

#[derive(Debug, Deserialize)]
struct BlockchainInfoOutput {
    tx_hash_big_endian: String,
    tx_output_n: u32,
    value: u64,
    #[serde(default)]
    script: Option<String>,
}

/// blockchain.info client (mainnet)
pub struct BlockchainInfoClient {
    client: reqwest::Client,
    base_url: String,
}

impl BlockchainInfoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BitcoinLedger for BlockchainInfoClient {
    async fn list_unspent(&self, address: &str) -> Result<Vec<Utxo>, WalletError> {
        let url = format!("{}/unspent?active={}", self.base_url, address);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;

        // An address without outputs is reported as an error
        if response.status() == reqwest::StatusCode::INTERNAL_SERVER_ERROR {
            let body = response.text().await.unwrap_or_default();
            if body.contains("No free outputs") {
                return Ok(Vec::new());
            }
            return Err(WalletError::LedgerUnavailable(format!(
                "utxo query failed: {}",
                body
            )));
        }

        let unspent: BlockchainInfoUnspent =
            ensure_success(response, "utxo query").await?.json().await?;

        Ok(unspent
            .unspent_outputs
            .into_iter()
            .map(|u| Utxo {
                txid: u.tx_hash_big_endian,
                vout: u.tx_output_n,
                value: u.value,
                script_pubkey: u.script,
            })
            .collect())
    }

    async fn address_balance(&self, address: &str) -> Result<u64, WalletError> {
        let url = format!("{}/q/addressbalance/{}", self.base_url, address);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let text = ensure_success(response, "address balance").await?.text().await?;

        text.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| WalletError::InvalidResponse(e.to_string()))
    }

    async fn tip_height(&self) -> Result<u64, WalletError> {
        let url = format!("{}/q/getblockcount", self.base_url);

        let response = self.client.get(&url).send().await?;
        let text = ensure_success(response, "block count").await?.text().await?;

        text.trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| WalletError::InvalidResponse(e.to_string()))
    }

    async fn raw_transaction(&self, txid: &str) -> Result<String, WalletError> {
        let url = format!("{}/rawtx/{}?format=hex", self.base_url, txid);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        Ok(ensure_success(response, "raw transaction")
            .await?
            .text()
            .await?
            .trim()
            .to_string())
    }

    /// The push endpoint answers with free text, so the txid is computed locally
    async fn broadcast(&self, tx_hex: &str) -> Result<String, WalletError> {
        let txid = txid_of(tx_hex)?;
        log::debug!("Broadcasting transaction {} to: {}/pushtx", txid, self.base_url);

        let response = self
            .client
            .post(format!("{}/pushtx", self.base_url))
            .form(&[("tx", tx_hex)])
            .send()
            .await?;
        ensure_success(response, "broadcast").await?;

        Ok(txid)
    }
}
