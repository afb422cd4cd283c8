/// blockchain.info endpoints (mainnet)

use axum::{
    extract::{Path, Query, State},
    Form, Json,
};

use super::{ApiError, AppState};
use crate::types::*;

/// GET /unspent?active={address}
/// An address without outputs is reported as a server error, like the real API
pub async fn get_unspent(
    State(ledger): State<AppState>,
    Query(query): Query<UnspentQuery>,
) -> Result<Json<UnspentOutputs>, ApiError> {
    let state = ledger.state();
    let outputs: Vec<UnspentOutput> = state
        .bitcoin_outputs
        .get(&query.active)
        .map(|outputs| {
            outputs
                .iter()
                .map(|o| UnspentOutput {
                    tx_hash_big_endian: o.txid.clone(),
                    tx_output_n: o.vout,
                    script: o.script_hex.clone(),
                    value: o.value,
                    confirmations: 6,
                })
                .collect()
        })
        .unwrap_or_default();

    if outputs.is_empty() {
        return Err(ApiError::Internal("No free outputs to spend".to_string()));
    }

    Ok(Json(UnspentOutputs {
        notice: String::new(),
        unspent_outputs: outputs,
    }))
}

/// GET /q/addressbalance/{address}
pub async fn get_address_balance(
    State(ledger): State<AppState>,
    Path(address): Path<String>,
) -> String {
    ledger.bitcoin_balance(&address).to_string()
}

/// GET /q/getblockcount
pub async fn get_block_count(State(ledger): State<AppState>) -> String {
    ledger.state().tip_height.to_string()
}

/// GET /rawtx/{txid}?format=hex
pub async fn get_raw_transaction(
    State(ledger): State<AppState>,
    Path(txid): Path<String>,
    Query(query): Query<RawTxQuery>,
) -> Result<String, ApiError> {
    if query.format.as_deref() != Some("hex") {
        return Err(ApiError::BadRequest("only format=hex is supported".to_string()));
    }
    ledger
        .bitcoin_transaction(&txid)
        .ok_or_else(|| ApiError::NotFound(format!("Transaction not found: {}", txid)))
}

/// POST /pushtx (form field `tx`)
pub async fn push_transaction(
    State(ledger): State<AppState>,
    Form(form): Form<PushTxForm>,
) -> Result<&'static str, ApiError> {
    let mut state = ledger.state();
    if state.fail_broadcast {
        return Err(ApiError::Internal("Transaction rejected".to_string()));
    }

    state
        .apply_bitcoin_tx(&form.tx)
        .map_err(|e| ApiError::Internal(format!("Unable to decode transaction: {}", e)))?;
    Ok("Transaction Submitted")
}
