use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default invoice lifetime in seconds
pub const DEFAULT_INVOICE_EXPIRY: u64 = 3_600;
/// Default number of history entries fetched
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Incoming payment request issued by the channel node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub payment_request: String,
    pub payment_hash: String,
    pub amount_sats: u64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_paid: bool,
}

impl Invoice {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Usable for payment iff unpaid and not yet expired
    pub fn is_payable(&self, now: DateTime<Utc>) -> bool {
        !self.is_paid && !self.is_expired(now)
    }
}

/// Invoice fields as reported by the node's decoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedInvoice {
    pub payment_hash: String,
    pub amount_msat: u64,
    #[serde(default)]
    pub description: String,
    /// Creation time, unix seconds
    pub date: i64,
    /// Lifetime in seconds
    pub expiry: u64,
}

impl DecodedInvoice {
    pub fn amount_sats(&self) -> u64 {
        self.amount_msat / 1_000
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date.checked_add(self.expiry as i64)?, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    Opening,
    Active,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub remote_pubkey: String,
    pub local_balance: u64,
    pub capacity: u64,
    pub funding_txid: Option<String>,
    pub state: ChannelState,
}

/// Entry of the node's payment history. Outgoing payments carry a negative amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_hash: String,
    pub amount_sats: i64,
    pub memo: String,
    pub pending: bool,
    pub time: DateTime<Utc>,
}

impl Payment {
    pub fn is_outgoing(&self) -> bool {
        self.amount_sats < 0
    }
}
