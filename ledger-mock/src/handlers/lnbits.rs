/// LNbits wallet endpoints (channel node)

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};

use super::{ApiError, AppState};
use crate::state::{foreign_payment_hash, now_unix, LedgerState};
use crate::types::*;

const DEFAULT_LIMIT: usize = 50;

/// Check the node is reachable and the key is right, then hand out the state
fn authorize<'a>(
    ledger: &'a AppState,
    headers: &HeaderMap,
) -> Result<std::sync::MutexGuard<'a, LedgerState>, ApiError> {
    let state = ledger.state();
    if state.channel_down {
        return Err(ApiError::Unavailable("node is offline".to_string()));
    }
    match headers.get("X-Api-Key").and_then(|v| v.to_str().ok()) {
        Some(key) if key == state.api_key => Ok(state),
        _ => Err(ApiError::Unauthorized("Invalid key".to_string())),
    }
}

/// GET /api/v1/balance
pub async fn get_balance(
    State(ledger): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WalletBalance>, ApiError> {
    let state = authorize(&ledger, &headers)?;
    Ok(Json(WalletBalance {
        balance: state.channel_balance,
    }))
}

/// POST /api/v1/payments
/// Creates an invoice when `out` is false, pays `bolt11` when it is true
pub async fn post_payment(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PaymentRequest>,
) -> Result<Response, ApiError> {
    let mut state = authorize(&ledger, &headers)?;

    if !request.out {
        let amount = request
            .amount
            .filter(|a| *a > 0)
            .ok_or_else(|| ApiError::BadRequest("amount must be positive".to_string()))?;
        let invoice = state.add_invoice(
            amount,
            request.memo.as_deref().unwrap_or_default(),
            now_unix(),
            request.expiry.unwrap_or(3_600),
        );
        log::info!("Issued invoice {}", invoice.payment_hash);

        return Ok(Json(CreatedInvoice {
            checking_id: invoice.payment_hash.clone(),
            payment_hash: invoice.payment_hash,
            payment_request: invoice.payment_request,
        })
        .into_response());
    }

    let bolt11 = request
        .bolt11
        .ok_or_else(|| ApiError::BadRequest("bolt11 is required".to_string()))?;
    if state.fail_payments {
        return Err(ApiError::BadRequest("Payment failed: no route found".to_string()));
    }

    let now = now_unix();
    let (payment_hash, amount_sats, memo) = match state.invoices.get(&bolt11) {
        Some(invoice) if invoice.paid => {
            return Err(ApiError::BadRequest("invoice already paid".to_string()))
        }
        Some(invoice) if invoice.is_expired(now) => {
            return Err(ApiError::BadRequest("invoice expired".to_string()))
        }
        Some(invoice) => (
            invoice.payment_hash.clone(),
            invoice.amount_sats,
            invoice.memo.clone(),
        ),
        None => return Err(ApiError::BadRequest("Invalid bolt11 invoice".to_string())),
    };

    if state.channel_balance < amount_sats {
        return Err(ApiError::BadRequest("Insufficient balance".to_string()));
    }
    state.channel_balance -= amount_sats;
    if let Some(invoice) = state.invoices.get_mut(&bolt11) {
        invoice.paid = true;
    }
    state.payments.push(PaymentEntry {
        payment_hash: payment_hash.clone(),
        amount: -(amount_sats as i64) * 1_000,
        memo,
        pending: false,
        time: now,
    });

    Ok(Json(PaidInvoice {
        checking_id: payment_hash.clone(),
        payment_hash,
    })
    .into_response())
}

/// GET /api/v1/payments/{payment_hash}
pub async fn get_payment_status(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Path(payment_hash): Path<String>,
) -> Result<Json<PaymentStatus>, ApiError> {
    let state = authorize(&ledger, &headers)?;
    let invoice = state
        .invoices
        .values()
        .find(|i| i.payment_hash == payment_hash)
        .ok_or_else(|| ApiError::NotFound("Payment does not exist.".to_string()))?;
    Ok(Json(PaymentStatus { paid: invoice.paid }))
}

/// GET /api/v1/payments/decode?bolt11=
pub async fn decode_invoice(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DecodeQuery>,
) -> Result<Json<Decoded>, ApiError> {
    let state = authorize(&ledger, &headers)?;
    match state.invoices.get(&query.bolt11) {
        Some(invoice) => Ok(Json(Decoded {
            payment_hash: invoice.payment_hash.clone(),
            amount_msat: invoice.amount_sats * 1_000,
            description: invoice.memo.clone(),
            date: invoice.created,
            expiry: invoice.expiry,
        })),
        None if query.bolt11.starts_with("ln") => Err(ApiError::BadRequest(format!(
            "Unknown invoice {}",
            foreign_payment_hash(&query.bolt11)
        ))),
        None => Err(ApiError::BadRequest("Invalid bolt11 invoice".to_string())),
    }
}

/// GET /api/v1/payments?limit=
/// Newest first
pub async fn get_payments(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PaymentEntry>>, ApiError> {
    let state = authorize(&ledger, &headers)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    Ok(Json(
        state.payments.iter().rev().take(limit).cloned().collect(),
    ))
}

/// GET /api/v1/channels
pub async fn get_channels(
    State(ledger): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChannelEntry>>, ApiError> {
    let state = authorize(&ledger, &headers)?;
    Ok(Json(state.channels.clone()))
}

/// POST /api/v1/channels
pub async fn open_channel(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OpenChannel>,
) -> Result<Json<Funding>, ApiError> {
    let mut state = authorize(&ledger, &headers)?;
    if request.push_amount > request.local_amount {
        return Err(ApiError::BadRequest("push amount exceeds funding".to_string()));
    }
    if request.node_id.len() != 66 || hex::decode(&request.node_id).is_err() {
        return Err(ApiError::BadRequest(format!("invalid node id {}", request.node_id)));
    }

    let funding_txid = state.next_txid();
    let channel_id = hex::encode(state.next_hash());
    state.channels.push(ChannelEntry {
        channel_id,
        peer_id: request.node_id,
        local_balance: request.local_amount - request.push_amount,
        capacity: request.local_amount,
        funding_txid: Some(funding_txid.clone()),
        state: "opening".to_string(),
    });

    log::info!("Opening channel, funding txid {}", funding_txid);
    Ok(Json(Funding { funding_txid }))
}

/// DELETE /api/v1/channels/{channel_id}?force=
pub async fn close_channel(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Path(channel_id): Path<String>,
    Query(query): Query<CloseQuery>,
) -> Result<Json<Closing>, ApiError> {
    let mut state = authorize(&ledger, &headers)?;
    let closing_txid = state.next_txid();

    let channel = state
        .channels
        .iter_mut()
        .find(|c| c.channel_id == channel_id)
        .ok_or_else(|| ApiError::NotFound(format!("channel {} not found", channel_id)))?;
    if channel.state == "closed" {
        return Err(ApiError::BadRequest(format!("channel {} is already closed", channel_id)));
    }
    channel.state = "closed".to_string();

    log::info!(
        "Closing channel {} (force: {}), closing txid {}",
        channel_id,
        query.force,
        closing_txid
    );
    Ok(Json(Closing { closing_txid }))
}
