use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Channel, ChannelState, DecodedInvoice, Invoice, Payment};
use crate::error::WalletError;
use crate::http::ensure_success;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Payment-channel node operations
#[async_trait]
pub trait ChannelNode: Send + Sync {
    /// Spendable channel balance in sats
    async fn balance(&self) -> Result<u64, WalletError>;

    async fn create_invoice(
        &self,
        amount_sats: u64,
        description: &str,
        expiry_secs: u64,
    ) -> Result<Invoice, WalletError>;

    /// Pay a payment request, returning the payment hash
    async fn pay_invoice(&self, payment_request: &str) -> Result<String, WalletError>;

    /// Whether the invoice with `payment_hash` has been paid
    async fn invoice_status(&self, payment_hash: &str) -> Result<bool, WalletError>;

    async fn decode_invoice(&self, payment_request: &str) -> Result<DecodedInvoice, WalletError>;

    async fn payment_history(&self, limit: usize) -> Result<Vec<Payment>, WalletError>;

    async fn list_channels(&self) -> Result<Vec<Channel>, WalletError>;

    /// Open a channel, returning the funding txid
    async fn open_channel(
        &self,
        node_pubkey: &str,
        local_amount_sats: u64,
        push_amount_sats: u64,
    ) -> Result<String, WalletError>;

    /// Close a channel, returning the closing txid
    async fn close_channel(&self, channel_id: &str, force: bool) -> Result<String, WalletError>;
}

#[derive(Debug, Serialize)]
struct CreateInvoiceRequest<'a> {
    out: bool,
    amount: u64,
    memo: &'a str,
    expiry: u64,
}

#[derive(Debug, Serialize)]
struct PayInvoiceRequest<'a> {
    out: bool,
    bolt11: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenChannelRequest<'a> {
    node_id: &'a str,
    local_amount: u64,
    push_amount: u64,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: u64,
}

#[derive(Debug, Deserialize)]
struct CreateInvoiceResponse {
    payment_hash: String,
    payment_request: String,
}

#[derive(Debug, Deserialize)]
struct PayInvoiceResponse {
    payment_hash: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceStatusResponse {
    #[serde(default)]
    paid: bool,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    payment_hash: String,
    /// Millisatoshis, negative when outgoing
    amount: i64,
    #[serde(default)]
    memo: String,
    #[serde(default)]
    pending: bool,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct ChannelResponse {
    channel_id: String,
    #[serde(alias = "peer_id")]
    remote_pubkey: String,
    #[serde(default)]
    local_balance: u64,
    #[serde(default)]
    capacity: u64,
    funding_txid: Option<String>,
    state: ChannelState,
}

#[derive(Debug, Deserialize)]
struct FundingResponse {
    funding_txid: String,
}

#[derive(Debug, Deserialize)]
struct ClosingResponse {
    closing_txid: String,
}

/// LNbits-style REST client
pub struct LnbitsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl LnbitsClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map a rejected pay/open/close to `PaymentFailed` with the node's reason
    async fn require_success(
        response: reqwest::Response,
        what: &str,
    ) -> Result<reqwest::Response, WalletError> {
        match ensure_success(response, what).await {
            Err(WalletError::LedgerUnavailable(cause)) => Err(WalletError::PaymentFailed(cause)),
            other => other,
        }
    }
}

#[async_trait]
impl ChannelNode for LnbitsClient {
    async fn balance(&self) -> Result<u64, WalletError> {
        let response = self
            .client
            .get(self.url("/api/v1/balance"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let balance: BalanceResponse = ensure_success(response, "balance").await?.json().await?;
        Ok(balance.balance)
    }

    async fn create_invoice(
        &self,
        amount_sats: u64,
        description: &str,
        expiry_secs: u64,
    ) -> Result<Invoice, WalletError> {
        if amount_sats == 0 {
            return Err(WalletError::InvalidInput(
                "Invoice amount must be positive".into(),
            ));
        }

        let invalid_expiry = || WalletError::InvalidInput(format!("Invalid expiry {}", expiry_secs));
        let lifetime = i64::try_from(expiry_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(invalid_expiry)?;
        let created_at = Utc::now();
        let expires_at = created_at
            .checked_add_signed(lifetime)
            .ok_or_else(invalid_expiry)?;

        let response = self
            .client
            .post(self.url("/api/v1/payments"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&CreateInvoiceRequest {
                out: false,
                amount: amount_sats,
                memo: description,
                expiry: expiry_secs,
            })
            .send()
            .await?;
        let created: CreateInvoiceResponse =
            ensure_success(response, "create invoice").await?.json().await?;

        log::info!(
            "Created invoice {} for {} sats",
            created.payment_hash,
            amount_sats
        );

        Ok(Invoice {
            payment_request: created.payment_request,
            payment_hash: created.payment_hash,
            amount_sats,
            description: description.to_string(),
            created_at,
            expires_at,
            is_paid: false,
        })
    }

    async fn pay_invoice(&self, payment_request: &str) -> Result<String, WalletError> {
        let response = self
            .client
            .post(self.url("/api/v1/payments"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&PayInvoiceRequest {
                out: true,
                bolt11: payment_request,
            })
            .send()
            .await?;
        let paid: PayInvoiceResponse = Self::require_success(response, "payment")
            .await?
            .json()
            .await?;

        log::info!("Paid invoice - payment hash: {}", paid.payment_hash);
        Ok(paid.payment_hash)
    }

    async fn invoice_status(&self, payment_hash: &str) -> Result<bool, WalletError> {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/payments/{}", payment_hash)))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let status: InvoiceStatusResponse =
            ensure_success(response, "invoice status").await?.json().await?;
        Ok(status.paid)
    }

    async fn decode_invoice(&self, payment_request: &str) -> Result<DecodedInvoice, WalletError> {
        let response = self
            .client
            .get(self.url("/api/v1/payments/decode"))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("bolt11", payment_request)])
            .send()
            .await?;
        Ok(ensure_success(response, "decode invoice")
            .await?
            .json()
            .await?)
    }

    async fn payment_history(&self, limit: usize) -> Result<Vec<Payment>, WalletError> {
        let response = self
            .client
            .get(self.url("/api/v1/payments"))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("limit", limit)])
            .send()
            .await?;
        let payments: Vec<PaymentResponse> =
            ensure_success(response, "payment history").await?.json().await?;

        payments
            .into_iter()
            .map(|p| {
                let time = Utc.timestamp_opt(p.time, 0).single().ok_or_else(|| {
                    WalletError::InvalidResponse(format!("invalid payment time {}", p.time))
                })?;
                Ok(Payment {
                    payment_hash: p.payment_hash,
                    amount_sats: p.amount / 1_000,
                    memo: p.memo,
                    pending: p.pending,
                    time,
                })
            })
            .collect()
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, WalletError> {
        let response = self
            .client
            .get(self.url("/api/v1/channels"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let channels: Vec<ChannelResponse> =
            ensure_success(response, "list channels").await?.json().await?;

        Ok(channels
            .into_iter()
            .map(|c| Channel {
                channel_id: c.channel_id,
                remote_pubkey: c.remote_pubkey,
                local_balance: c.local_balance,
                capacity: c.capacity,
                funding_txid: c.funding_txid,
                state: c.state,
            })
            .collect())
    }

    async fn open_channel(
        &self,
        node_pubkey: &str,
        local_amount_sats: u64,
        push_amount_sats: u64,
    ) -> Result<String, WalletError> {
        if push_amount_sats > local_amount_sats {
            return Err(WalletError::InvalidInput(
                "Push amount exceeds channel funding".into(),
            ));
        }

        let response = self
            .client
            .post(self.url("/api/v1/channels"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&OpenChannelRequest {
                node_id: node_pubkey,
                local_amount: local_amount_sats,
                push_amount: push_amount_sats,
            })
            .send()
            .await?;
        let funding: FundingResponse = Self::require_success(response, "open channel")
            .await?
            .json()
            .await?;

        log::info!(
            "Opening channel with {} - funding txid: {}",
            node_pubkey,
            funding.funding_txid
        );
        Ok(funding.funding_txid)
    }

    async fn close_channel(&self, channel_id: &str, force: bool) -> Result<String, WalletError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/v1/channels/{}", channel_id)))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("force", force)])
            .send()
            .await?;
        let closing: ClosingResponse = Self::require_success(response, "close channel")
            .await?
            .json()
            .await?;

        log::info!(
            "Closing channel {} (force: {}) - closing txid: {}",
            channel_id,
            force,
            closing.closing_txid
        );
        Ok(closing.closing_txid)
    }
}
