/// Blockfrost endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};

use super::{ApiError, AppState};
use crate::state::{cardano_tx_id, EPOCH_LENGTH_SECS};
use crate::types::*;

const PAGE_SIZE: usize = 100;

fn require_project_id(headers: &HeaderMap) -> Result<(), ApiError> {
    match headers.get("project_id").and_then(|v| v.to_str().ok()) {
        Some(id) if !id.is_empty() => Ok(()),
        _ => Err(ApiError::Unauthorized(
            "Missing project token. Please include project_id in your request.".to_string(),
        )),
    }
}

/// GET /addresses/{address}
pub async fn get_address(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Path(address): Path<String>,
) -> Result<Json<AddressInfo>, ApiError> {
    require_project_id(&headers)?;
    let state = ledger.state();
    let outputs = state
        .cardano_outputs
        .get(&address)
        .ok_or_else(|| ApiError::NotFound("The requested component has not been found.".into()))?;

    let lovelace: u64 = outputs.iter().map(|o| o.lovelace()).sum();
    Ok(Json(AddressInfo {
        address,
        amount: vec![Amount {
            unit: "lovelace".to_string(),
            quantity: lovelace.to_string(),
        }],
    }))
}

/// GET /addresses/{address}/utxos?page={n}
pub async fn get_address_utxos(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Path(address): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<AddressUtxo>>, ApiError> {
    require_project_id(&headers)?;
    let state = ledger.state();
    let outputs = state
        .cardano_outputs
        .get(&address)
        .ok_or_else(|| ApiError::NotFound("The requested component has not been found.".into()))?;

    let page = query.page.unwrap_or(1).max(1);
    let utxos = outputs
        .iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .map(|o| AddressUtxo {
            address: address.clone(),
            tx_hash: o.tx_hash.clone(),
            output_index: o.output_index,
            amount: o.amount.clone(),
        })
        .collect();
    Ok(Json(utxos))
}

/// GET /epochs/latest/parameters
pub async fn get_parameters(
    State(ledger): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<EpochParameters>, ApiError> {
    require_project_id(&headers)?;
    let state = ledger.state();
    Ok(Json(EpochParameters {
        epoch: state.epoch,
        min_fee_a: state.min_fee_a,
        min_fee_b: state.min_fee_b,
        key_deposit: state.key_deposit.to_string(),
        pool_deposit: "500000000".to_string(),
    }))
}

/// GET /epochs/latest
pub async fn get_epoch(
    State(ledger): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Epoch>, ApiError> {
    require_project_id(&headers)?;
    let state = ledger.state();
    Ok(Json(Epoch {
        epoch: state.epoch,
        start_time: state.epoch_start,
        end_time: state.epoch_start + EPOCH_LENGTH_SECS,
    }))
}

/// GET /blocks/latest
pub async fn get_latest_block(
    State(ledger): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Block>, ApiError> {
    require_project_id(&headers)?;
    let state = ledger.state();
    Ok(Json(Block {
        slot: state.slot,
        height: state.tip_height,
    }))
}

/// GET /accounts/{stake_address}
pub async fn get_account(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    Path(stake_address): Path<String>,
) -> Result<Json<Account>, ApiError> {
    require_project_id(&headers)?;
    let state = ledger.state();
    let account = state
        .accounts
        .get(&stake_address)
        .ok_or_else(|| ApiError::NotFound("The requested component has not been found.".into()))?;

    Ok(Json(Account {
        stake_address,
        active: account.active,
        controlled_amount: account.controlled_amount.to_string(),
        rewards_sum: account.rewards_sum.to_string(),
        withdrawals_sum: "0".to_string(),
        withdrawable_amount: account.withdrawable_amount.to_string(),
        pool_id: account.pool_id.clone(),
    }))
}

/// POST /tx/submit (application/cbor)
/// Returns the transaction id as a JSON string
pub async fn submit_transaction(
    State(ledger): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<String>, ApiError> {
    require_project_id(&headers)?;
    if headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        != Some("application/cbor")
    {
        return Err(ApiError::BadRequest("Content-Type must be application/cbor".into()));
    }

    let tx_id = cardano_tx_id(&body)
        .ok_or_else(|| ApiError::BadRequest("transaction is not a 4-element CBOR array".into()))?;

    ledger.state().submissions.push(body.to_vec());
    log::info!("Accepted Cardano transaction {}", tx_id);
    Ok(Json(tx_id))
}
