/// Esplora endpoints (testnet, signet, regtest)

use axum::{
    extract::{Path, State},
    Json,
};

use super::{ApiError, AppState};
use crate::types::*;

/// GET /address/{address}/utxo
pub async fn get_address_utxos(
    State(ledger): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Vec<EsploraUtxo>>, ApiError> {
    let state = ledger.state();
    let utxos = state
        .bitcoin_outputs
        .get(&address)
        .map(|outputs| {
            outputs
                .iter()
                .map(|o| EsploraUtxo {
                    txid: o.txid.clone(),
                    vout: o.vout,
                    value: o.value,
                    status: UtxoStatus {
                        confirmed: true,
                        block_height: Some(state.tip_height),
                    },
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(Json(utxos))
}

/// GET /address/{address}
pub async fn get_address(
    State(ledger): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<EsploraAddress>, ApiError> {
    let state = ledger.state();
    let outputs = state.bitcoin_outputs.get(&address);
    let funded_txo_count = outputs.map(|o| o.len() as u64).unwrap_or(0);
    let funded_txo_sum = outputs
        .map(|o| o.iter().map(|u| u.value).sum())
        .unwrap_or(0);

    Ok(Json(EsploraAddress {
        address,
        chain_stats: ChainStats {
            funded_txo_count,
            funded_txo_sum,
            spent_txo_count: 0,
            spent_txo_sum: 0,
            tx_count: funded_txo_count,
        },
    }))
}

/// GET /blocks/tip/height
pub async fn get_tip_height(State(ledger): State<AppState>) -> String {
    ledger.state().tip_height.to_string()
}

/// GET /tx/{txid}/hex
pub async fn get_transaction_hex(
    State(ledger): State<AppState>,
    Path(txid): Path<String>,
) -> Result<String, ApiError> {
    ledger
        .bitcoin_transaction(&txid)
        .ok_or_else(|| ApiError::NotFound(format!("Transaction not found: {}", txid)))
}

/// POST /tx
/// Broadcasts a raw transaction (hex string in body), returning the txid as plain text
pub async fn broadcast_transaction(
    State(ledger): State<AppState>,
    body: String,
) -> Result<String, ApiError> {
    let mut state = ledger.state();
    if state.fail_broadcast {
        return Err(ApiError::BadRequest(
            "sendrawtransaction RPC error: {\"code\":-26,\"message\":\"min relay fee not met\"}"
                .to_string(),
        ));
    }

    state
        .apply_bitcoin_tx(&body)
        .map_err(|e| ApiError::BadRequest(format!("Failed to broadcast: {}", e)))
}
