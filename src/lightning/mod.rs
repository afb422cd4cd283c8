//! Payment-channel operations
//!
//! Invoices, payments and channel management against an LNbits-style node.
//! Independent of the on-chain build pipeline.

pub mod client;
pub mod types;

pub use client::{ChannelNode, LnbitsClient};
pub use types::{
    Channel, ChannelState, DecodedInvoice, Invoice, Payment, DEFAULT_HISTORY_LIMIT,
    DEFAULT_INVOICE_EXPIRY,
};

use chrono::Utc;

use crate::error::WalletError;

/// Pay a known invoice, refusing ones that are already paid or expired
pub async fn pay_invoice(node: &dyn ChannelNode, invoice: &Invoice) -> Result<String, WalletError> {
    let now = Utc::now();
    if invoice.is_paid {
        return Err(WalletError::PaymentFailed(format!(
            "invoice {} is already paid",
            invoice.payment_hash
        )));
    }
    if invoice.is_expired(now) {
        return Err(WalletError::PaymentFailed(format!(
            "invoice {} expired at {}",
            invoice.payment_hash, invoice.expires_at
        )));
    }

    node.pay_invoice(&invoice.payment_request).await
}

/// Poll the node and record a settled invoice as paid
pub async fn refresh_invoice(
    node: &dyn ChannelNode,
    invoice: &mut Invoice,
) -> Result<bool, WalletError> {
    if !invoice.is_paid {
        invoice.is_paid = node.invoice_status(&invoice.payment_hash).await?;
    }
    Ok(invoice.is_paid)
}
