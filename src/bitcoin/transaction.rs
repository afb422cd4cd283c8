use bitcoin::blockdata::script::ScriptBuf;
use bitcoin::blockdata::transaction::{Transaction, TxIn, TxOut};
use bitcoin::blockdata::witness::Witness;
use bitcoin::hashes::Hash;
use bitcoin::key::CompressedPublicKey;
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::{OutPoint, Sequence};
use bitcoin::{absolute, Address, Amount, Network, PrivateKey, Txid};

use super::client::Utxo;
use crate::error::WalletError;

/// Outputs at or below this value are not worth creating
pub const DUST_LIMIT: u64 = 546;
/// Headroom added to the amount when accumulating inputs
pub const SELECTION_MARGIN: u64 = 1_000;

const INPUT_SIZE: u64 = 148;
const OUTPUT_SIZE: u64 = 34;
const TX_OVERHEAD: u64 = 10;

/// Inputs, fee and change chosen for one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoPlan {
    pub inputs: Vec<Utxo>,
    pub amount: u64,
    /// Includes any change folded in as dust
    pub fee: u64,
    /// Zero when no change output is emitted
    pub change: u64,
    pub estimated_size: u64,
}

impl UtxoPlan {
    pub fn total_input(&self) -> u64 {
        self.inputs.iter().map(|u| u.value).sum()
    }

    pub fn has_change_output(&self) -> bool {
        self.change > 0
    }
}

pub struct TransactionBuilder {
    network: Network,
    fee_rate: u64,
}

impl TransactionBuilder {
    /// Create a new transaction builder for the specified network and sat/byte rate
    pub fn new(network: Network, fee_rate: u64) -> Self {
        Self { network, fee_rate }
    }

    pub fn fee_rate(&self) -> u64 {
        self.fee_rate
    }

    /// First-fit selection in the order the indexer returned the outputs.
    ///
    /// Stops once the running total covers `amount + 1000`, then prices the
    /// transaction at `inputs * 148 + 2 * 34 + 10` bytes.
    pub fn plan(&self, utxos: &[Utxo], amount_sats: u64) -> Result<UtxoPlan, WalletError> {
        if amount_sats == 0 {
            return Err(WalletError::InvalidInput("Amount must be positive".into()));
        }
        if utxos.is_empty() {
            return Err(WalletError::NoUtxos("sender address".into()));
        }

        let target = amount_sats.saturating_add(SELECTION_MARGIN);
        let mut inputs = Vec::new();
        let mut total = 0u64;

        for utxo in utxos {
            inputs.push(utxo.clone());
            total = total.checked_add(utxo.value).ok_or_else(|| {
                WalletError::InvalidResponse(format!(
                    "unspent output values overflow at {}:{}",
                    utxo.txid, utxo.vout
                ))
            })?;
            if total >= target {
                break;
            }
        }

        let estimated_size = self.estimate_tx_size(inputs.len());
        let fee = estimated_size.checked_mul(self.fee_rate).ok_or_else(|| {
            WalletError::InvalidInput(format!("Fee rate {} is out of range", self.fee_rate))
        })?;

        let required = amount_sats.checked_add(fee).ok_or_else(|| {
            WalletError::InsufficientFunds(format!(
                "{} sats plus a {} sat fee exceeds any spendable amount",
                amount_sats, fee
            ))
        })?;
        if total < required {
            return Err(WalletError::InsufficientFunds(format!(
                "Need {} sats (amount + fee), but only have {} sats",
                required, total
            )));
        }

        let change_amount = total - required;
        let (fee, change) = if change_amount > DUST_LIMIT {
            (fee, change_amount)
        } else {
            (fee + change_amount, 0)
        };

        log::info!(
            "Selected {} inputs ({} sats) for {} sats, fee {} sats, change {} sats",
            inputs.len(),
            total,
            amount_sats,
            fee,
            change
        );

        Ok(UtxoPlan {
            inputs,
            amount: amount_sats,
            fee,
            change,
            estimated_size,
        })
    }

    /// Assemble the unsigned transaction for a plan
    pub fn build(
        &self,
        plan: &UtxoPlan,
        recipient: &Address,
        change_address: &Address,
    ) -> Result<Transaction, WalletError> {
        let mut tx = Transaction {
            version: bitcoin::transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![],
            output: vec![],
        };

        for utxo in &plan.inputs {
            tx.input.push(TxIn {
                previous_output: OutPoint {
                    txid: utxo
                        .txid
                        .parse()
                        .map_err(|e| WalletError::Bitcoin(format!("Invalid txid: {}", e)))?,
                    vout: utxo.vout,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            });
        }

        tx.output.push(TxOut {
            value: Amount::from_sat(plan.amount),
            script_pubkey: recipient.script_pubkey(),
        });

        if plan.has_change_output() {
            tx.output.push(TxOut {
                value: Amount::from_sat(plan.change),
                script_pubkey: change_address.script_pubkey(),
            });
        }

        Ok(tx)
    }

    /// Sign every input as P2WPKH with a single private key, in input order
    pub fn sign_transaction(
        &self,
        mut tx: Transaction,
        inputs: &[Utxo],
        private_key: &PrivateKey,
    ) -> Result<Transaction, WalletError> {
        if tx.input.len() != inputs.len() {
            return Err(WalletError::Bitcoin(format!(
                "{} inputs but {} spent outputs",
                tx.input.len(),
                inputs.len()
            )));
        }

        let secp = Secp256k1::new();
        let public_key = CompressedPublicKey::from_private_key(&secp, private_key)
            .map_err(|e| WalletError::Bitcoin(e.to_string()))?;
        let script_pubkey = Address::p2wpkh(&public_key, self.network).script_pubkey();

        let mut signatures = Vec::new();

        for (input_index, (input, utxo)) in tx.input.iter().zip(inputs).enumerate() {
            let txid: Txid = utxo
                .txid
                .parse()
                .map_err(|e| WalletError::Bitcoin(format!("Invalid txid: {}", e)))?;
            if input.previous_output.txid != txid || input.previous_output.vout != utxo.vout {
                return Err(WalletError::Bitcoin("UTXO not found for input".into()));
            }

            let mut sighash_cache = SighashCache::new(&tx);

            let sighash = sighash_cache
                .p2wpkh_signature_hash(
                    input_index,
                    &script_pubkey,
                    Amount::from_sat(utxo.value),
                    EcdsaSighashType::All,
                )
                .map_err(|e| WalletError::Bitcoin(e.to_string()))?;

            let message = Message::from_digest(sighash.to_byte_array());
            let signature = secp.sign_ecdsa(&message, &private_key.inner);

            let mut sig_with_hashtype = signature.serialize_der().to_vec();
            sig_with_hashtype.push(EcdsaSighashType::All.to_u32() as u8);

            signatures.push(sig_with_hashtype);
        }

        for (input, sig) in tx.input.iter_mut().zip(signatures) {
            input.witness.push(sig);
            input.witness.push(public_key.to_bytes());
        }

        Ok(tx)
    }

    /// Legacy-size estimate used for pricing: 148 per input, two outputs, 10 overhead
    fn estimate_tx_size(&self, num_inputs: usize) -> u64 {
        (num_inputs as u64)
            .saturating_mul(INPUT_SIZE)
            .saturating_add(2 * OUTPUT_SIZE + TX_OVERHEAD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::SecretKey;

    fn utxo(n: u8, value: u64) -> Utxo {
        Utxo {
            txid: format!("{:02x}", n).repeat(32),
            vout: n as u32,
            value,
            script_pubkey: None,
        }
    }

    fn test_key() -> PrivateKey {
        PrivateKey::new(SecretKey::from_slice(&[0x11; 32]).unwrap(), Network::Testnet)
    }

    fn test_address(key: &PrivateKey) -> Address {
        let secp = Secp256k1::new();
        let pk = CompressedPublicKey::from_private_key(&secp, key).unwrap();
        Address::p2wpkh(&pk, Network::Testnet)
    }

    #[test]
    fn test_two_input_scenario() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        let plan = builder
            .plan(&[utxo(1, 50_000), utxo(2, 60_000)], 70_000)
            .unwrap();

        assert_eq!(plan.inputs.len(), 2);
        assert_eq!(plan.estimated_size, 374);
        assert_eq!(plan.fee, 1_870);
        assert_eq!(plan.change, 38_130);
        assert!(plan.has_change_output());
    }

    #[test]
    fn test_first_fit_stops_early() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        let plan = builder
            .plan(&[utxo(1, 100_000), utxo(2, 60_000)], 10_000)
            .unwrap();

        assert_eq!(plan.inputs.len(), 1);
        assert_eq!(plan.inputs[0].vout, 1);
    }

    #[test]
    fn test_conservation() {
        let builder = TransactionBuilder::new(Network::Testnet, 3);
        let utxos = [utxo(1, 12_345), utxo(2, 40_000), utxo(3, 9_999)];

        for amount in [1_000u64, 20_000, 45_000, 55_000] {
            let plan = builder.plan(&utxos, amount).unwrap();
            assert_eq!(plan.total_input(), plan.amount + plan.fee + plan.change);
        }
    }

    #[test]
    fn test_dust_change_folded_into_fee() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        // size 226, fee 1130, change 500
        let plan = builder.plan(&[utxo(1, 11_630)], 10_000).unwrap();

        assert_eq!(plan.change, 0);
        assert_eq!(plan.fee, 1_630);
        assert!(!plan.has_change_output());

        let key = test_key();
        let address = test_address(&key);
        let tx = builder.build(&plan, &address, &address).unwrap();
        assert_eq!(tx.output.len(), 1);
    }

    #[test]
    fn test_change_at_dust_limit_is_folded() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        let plan = builder.plan(&[utxo(1, 11_676)], 10_000).unwrap();
        assert_eq!(plan.change, 0);
        assert_eq!(plan.fee, 1_676);

        let plan = builder.plan(&[utxo(1, 11_677)], 10_000).unwrap();
        assert_eq!(plan.change, 547);
    }

    #[test]
    fn test_insufficient_funds() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        let err = builder.plan(&[utxo(1, 10_500)], 10_000).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds(_)));
    }

    #[test]
    fn test_extreme_values_are_errors() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);

        // indexer values that cannot be summed
        let err = builder
            .plan(&[utxo(1, u64::MAX - 10), utxo(2, 100)], u64::MAX - 5)
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidResponse(_)));

        // amount plus fee past the integer range
        let err = builder.plan(&[utxo(1, u64::MAX)], u64::MAX).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds(_)));

        let greedy = TransactionBuilder::new(Network::Testnet, u64::MAX);
        let err = greedy.plan(&[utxo(1, 50_000)], 10_000).unwrap_err();
        assert!(matches!(err, WalletError::InvalidInput(_)));
    }

    #[test]
    fn test_no_utxos() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        assert!(matches!(
            builder.plan(&[], 10_000),
            Err(WalletError::NoUtxos(_))
        ));
    }

    #[test]
    fn test_zero_amount_rejected() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        assert!(matches!(
            builder.plan(&[utxo(1, 10_000)], 0),
            Err(WalletError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_sign_adds_witness_per_input() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        let key = test_key();
        let address = test_address(&key);
        let plan = builder
            .plan(&[utxo(1, 50_000), utxo(2, 60_000)], 70_000)
            .unwrap();

        let tx = builder.build(&plan, &address, &address).unwrap();
        assert_eq!(tx.output.len(), 2);
        assert_eq!(tx.output[1].value.to_sat(), 38_130);

        let signed = builder.sign_transaction(tx, &plan.inputs, &key).unwrap();
        for input in &signed.input {
            assert_eq!(input.witness.len(), 2);
            assert!(input.script_sig.is_empty());
        }
    }

    #[test]
    fn test_sign_rejects_mismatched_inputs() {
        let builder = TransactionBuilder::new(Network::Testnet, 5);
        let key = test_key();
        let address = test_address(&key);
        let plan = builder.plan(&[utxo(1, 50_000)], 10_000).unwrap();
        let tx = builder.build(&plan, &address, &address).unwrap();

        let err = builder
            .sign_transaction(tx, &[utxo(9, 50_000)], &key)
            .unwrap_err();
        assert!(matches!(err, WalletError::Bitcoin(_)));
    }
}
