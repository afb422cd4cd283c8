/// Wire types for every mocked API
///
/// Shapes follow the public APIs closely enough for the wallet clients to parse them.

use serde::{Deserialize, Serialize};

// ============================================================================
// Esplora
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct EsploraUtxo {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub status: UtxoStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct UtxoStatus {
    pub confirmed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EsploraAddress {
    pub address: String,
    pub chain_stats: ChainStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainStats {
    pub funded_txo_count: u64,
    pub funded_txo_sum: u64,
    pub spent_txo_count: u64,
    pub spent_txo_sum: u64,
    pub tx_count: u64,
}

// ============================================================================
// blockchain.info
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UnspentOutputs {
    pub notice: String,
    pub unspent_outputs: Vec<UnspentOutput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnspentOutput {
    pub tx_hash_big_endian: String,
    pub tx_output_n: u32,
    pub script: String,
    pub value: u64,
    pub confirmations: u64,
}

#[derive(Debug, Deserialize)]
pub struct UnspentQuery {
    pub active: String,
}

#[derive(Debug, Deserialize)]
pub struct RawTxQuery {
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PushTxForm {
    pub tx: String,
}

// ============================================================================
// Blockfrost
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Amount {
    pub unit: String,
    pub quantity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressInfo {
    pub address: String,
    pub amount: Vec<Amount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddressUtxo {
    pub address: String,
    pub tx_hash: String,
    pub output_index: u32,
    pub amount: Vec<Amount>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EpochParameters {
    pub epoch: u64,
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub key_deposit: String,
    pub pool_deposit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Epoch {
    pub epoch: u64,
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Block {
    pub slot: u64,
    pub height: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub stake_address: String,
    pub active: bool,
    pub controlled_amount: String,
    pub rewards_sum: String,
    pub withdrawals_sum: String,
    pub withdrawable_amount: String,
    pub pool_id: Option<String>,
}

// ============================================================================
// LNbits
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct WalletBalance {
    pub balance: u64,
}

/// Create (`out = false`) or pay (`out = true`) request on /api/v1/payments
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub out: bool,
    #[serde(default)]
    pub amount: Option<u64>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub expiry: Option<u64>,
    #[serde(default)]
    pub bolt11: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedInvoice {
    pub payment_hash: String,
    pub payment_request: String,
    pub checking_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaidInvoice {
    pub payment_hash: String,
    pub checking_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatus {
    pub paid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Decoded {
    pub payment_hash: String,
    pub amount_msat: u64,
    pub description: String,
    pub date: i64,
    pub expiry: u64,
}

#[derive(Debug, Deserialize)]
pub struct DecodeQuery {
    pub bolt11: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentEntry {
    pub payment_hash: String,
    /// Millisatoshis, negative when outgoing
    pub amount: i64,
    pub memo: String,
    pub pending: bool,
    pub time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelEntry {
    pub channel_id: String,
    pub peer_id: String,
    pub local_balance: u64,
    pub capacity: u64,
    pub funding_txid: Option<String>,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenChannel {
    pub node_id: String,
    pub local_amount: u64,
    #[serde(default)]
    pub push_amount: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Funding {
    pub funding_txid: String,
}

#[derive(Debug, Deserialize)]
pub struct CloseQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Closing {
    pub closing_txid: String,
}
