//! Bitcoin sending operations

use bitcoin::{Address, Transaction};
use std::str::FromStr;

use super::client::{txid_of, BitcoinLedger, Utxo};
use super::transaction::{TransactionBuilder, UtxoPlan};
use crate::error::WalletError;
use crate::keys::BitcoinIdentity;

/// Outcome of a broadcast transfer
#[derive(Debug, Clone)]
pub struct BitcoinTransfer {
    pub txid: String,
    pub plan: UtxoPlan,
}

/// Send `amount_sats` from the identity's address to `recipient`
pub async fn send_bitcoin(
    ledger: &dyn BitcoinLedger,
    identity: &BitcoinIdentity,
    recipient: &str,
    amount_sats: u64,
    fee_rate: u64,
) -> Result<BitcoinTransfer, WalletError> {
    log::info!(
        "Sending Bitcoin from {} to address: {}, amount: {} sats",
        identity.address,
        recipient,
        amount_sats
    );

    let to_address = Address::from_str(recipient)
        .map_err(|e| WalletError::InvalidInput(format!("Invalid address: {}", e)))?
        .require_network(identity.network)
        .map_err(|e| WalletError::InvalidInput(format!("Address network mismatch: {}", e)))?;
    let change_address = identity.address()?;

    let utxos = ledger.list_unspent(&identity.address).await?;
    if utxos.is_empty() {
        return Err(WalletError::NoUtxos(identity.address.clone()));
    }

    let builder = TransactionBuilder::new(identity.network, fee_rate);
    let plan = builder.plan(&utxos, amount_sats)?;

    verify_inputs(ledger, &plan.inputs, &change_address).await?;

    let tx = builder.build(&plan, &to_address, &change_address)?;
    let signed_tx = {
        let private_key = identity.signing_key()?;
        builder.sign_transaction(tx, &plan.inputs, &private_key)?
    };

    let txid = broadcast_transaction(ledger, &signed_tx).await?;
    log::info!("Bitcoin sent - txid: {}, fee: {} sats", txid, plan.fee);

    Ok(BitcoinTransfer { txid, plan })
}

/// Broadcast a signed transaction and return the txid reported by the indexer
pub async fn broadcast_transaction(
    ledger: &dyn BitcoinLedger,
    tx: &Transaction,
) -> Result<String, WalletError> {
    let tx_hex = bitcoin::consensus::encode::serialize_hex(tx);
    let local_txid = txid_of(&tx_hex)?;

    let txid = ledger.broadcast(&tx_hex).await?;
    if txid != local_txid {
        log::warn!(
            "Indexer returned txid {} for transaction {}",
            txid,
            local_txid
        );
    }

    Ok(txid)
}

/// Check each selected output against its funding transaction before signing
async fn verify_inputs(
    ledger: &dyn BitcoinLedger,
    inputs: &[Utxo],
    owner: &Address,
) -> Result<(), WalletError> {
    let owner_script = owner.script_pubkey();

    for utxo in inputs {
        let raw = ledger.raw_transaction(&utxo.txid).await?;
        let bytes = hex::decode(&raw).map_err(|e| {
            WalletError::InvalidResponse(format!("raw transaction {}: {}", utxo.txid, e))
        })?;
        let funding: Transaction = bitcoin::consensus::deserialize(&bytes).map_err(|e| {
            WalletError::InvalidResponse(format!("raw transaction {}: {}", utxo.txid, e))
        })?;

        let output = funding.output.get(utxo.vout as usize).ok_or_else(|| {
            WalletError::InvalidResponse(format!("{}:{} does not exist", utxo.txid, utxo.vout))
        })?;

        if output.script_pubkey != owner_script || output.value.to_sat() != utxo.value {
            return Err(WalletError::InvalidResponse(format!(
                "{}:{} is not a {} sat output to {}",
                utxo.txid, utxo.vout, utxo.value, owner
            )));
        }
    }

    Ok(())
}
