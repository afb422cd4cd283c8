//! ADA transfers and the shared submit pipeline

use super::address::decode_payment_address;
use super::client::CardanoLedger;
use super::transaction::{CardanoTxBuilder, TxIntent, TxOutput};
use crate::error::WalletError;
use crate::keys::CardanoIdentity;

/// Inputs must cover the amount plus this much headroom
pub const TRANSFER_BUFFER: u64 = 2_000_000;

/// Result of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardanoSubmission {
    /// Id returned by the ledger
    pub tx_id: String,
    pub fee: u64,
    pub change: u64,
}

/// Send `amount_lovelace` from the identity's base address to `recipient`
pub async fn send_ada(
    ledger: &dyn CardanoLedger,
    identity: &CardanoIdentity,
    recipient: &str,
    amount_lovelace: u64,
) -> Result<CardanoSubmission, WalletError> {
    log::info!(
        "Sending {} lovelace from {} to {}",
        amount_lovelace,
        identity.payment_address,
        recipient
    );

    if amount_lovelace == 0 {
        return Err(WalletError::InvalidInput("Amount must be positive".into()));
    }
    let selection_target = amount_lovelace
        .checked_add(TRANSFER_BUFFER)
        .ok_or_else(|| WalletError::InvalidInput(format!("Amount {} is out of range", amount_lovelace)))?;
    let recipient = decode_payment_address(recipient, identity.network)?;

    let intent = TxIntent {
        outputs: vec![TxOutput {
            address: recipient,
            lovelace: amount_lovelace,
        }],
        selection_target,
        ..Default::default()
    };

    submit_intent(ledger, identity, &intent).await
}

/// Fetch parameters and tip, select inputs, balance, sign and submit
pub(crate) async fn submit_intent(
    ledger: &dyn CardanoLedger,
    identity: &CardanoIdentity,
    intent: &TxIntent,
) -> Result<CardanoSubmission, WalletError> {
    let params = ledger.protocol_parameters().await?;
    let tip_slot = ledger.tip_slot().await?;

    let utxos = ledger.list_utxos(&identity.payment_address).await?;
    if utxos.is_empty() {
        return Err(WalletError::NoUtxos(identity.payment_address.clone()));
    }

    let change_address = decode_payment_address(&identity.payment_address, identity.network)
        .map_err(|e| WalletError::Derivation(e.to_string()))?;
    let builder = CardanoTxBuilder::new(params, tip_slot, change_address);
    let unsigned = builder.build(&utxos, intent)?;
    let fee = unsigned.body.fee;
    let change = unsigned.change;

    let signed = {
        let keys = identity.signing_keys()?;
        unsigned.sign(&keys)
    };
    let local_id = signed.tx_id();

    let tx_id = ledger.submit(&signed.to_bytes()).await?;
    if tx_id != local_id {
        log::warn!("Ledger returned id {} for transaction {}", tx_id, local_id);
    }
    log::info!("Cardano transaction submitted - id: {}, fee: {} lovelace", tx_id, fee);

    Ok(CardanoSubmission { tx_id, fee, change })
}
