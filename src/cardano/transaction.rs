use ed25519_dalek::Signer;

use super::address::blake2b_256;
use super::cbor::Encoder;
use super::client::{CardanoUtxo, ProtocolParameters};
use crate::error::WalletError;
use crate::keys::CardanoSigningKeys;

/// Slots a transaction stays valid after the current tip
pub const TTL_WINDOW: u64 = 3_600;

const BODY_INPUTS: u64 = 0;
const BODY_OUTPUTS: u64 = 1;
const BODY_FEE: u64 = 2;
const BODY_TTL: u64 = 3;
const BODY_CERTIFICATES: u64 = 4;
const BODY_WITHDRAWALS: u64 = 5;
const WITNESS_VKEYS: u64 = 0;

const CREDENTIAL_KEY_HASH: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Certificate {
    StakeRegistration {
        stake_key_hash: [u8; 28],
    },
    StakeDeregistration {
        stake_key_hash: [u8; 28],
    },
    StakeDelegation {
        stake_key_hash: [u8; 28],
        pool_key_hash: [u8; 28],
    },
}

impl Certificate {
    fn encode(&self, enc: &mut Encoder) {
        match self {
            Certificate::StakeRegistration { stake_key_hash } => {
                enc.array(2).uint(0);
                encode_credential(enc, stake_key_hash);
            }
            Certificate::StakeDeregistration { stake_key_hash } => {
                enc.array(2).uint(1);
                encode_credential(enc, stake_key_hash);
            }
            Certificate::StakeDelegation {
                stake_key_hash,
                pool_key_hash,
            } => {
                enc.array(3).uint(2);
                encode_credential(enc, stake_key_hash);
                enc.bytes(pool_key_hash);
            }
        }
    }
}

fn encode_credential(enc: &mut Encoder, key_hash: &[u8; 28]) {
    enc.array(2).uint(CREDENTIAL_KEY_HASH).bytes(key_hash);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub tx_hash: [u8; 32],
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Raw address bytes (header + credentials)
    pub address: Vec<u8>,
    pub lovelace: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    /// Raw reward address bytes
    pub reward_address: Vec<u8>,
    pub lovelace: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBody {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub fee: u64,
    pub ttl: u64,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Vec<Withdrawal>,
}

impl TxBody {
    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        let mut fields = 4;
        if !self.certificates.is_empty() {
            fields += 1;
        }
        if !self.withdrawals.is_empty() {
            fields += 1;
        }
        enc.map(fields);

        enc.uint(BODY_INPUTS).array(self.inputs.len());
        for input in &self.inputs {
            enc.array(2).bytes(&input.tx_hash).uint(input.index as u64);
        }

        enc.uint(BODY_OUTPUTS).array(self.outputs.len());
        for output in &self.outputs {
            enc.array(2).bytes(&output.address).uint(output.lovelace);
        }

        enc.uint(BODY_FEE).uint(self.fee);
        enc.uint(BODY_TTL).uint(self.ttl);

        if !self.certificates.is_empty() {
            enc.uint(BODY_CERTIFICATES).array(self.certificates.len());
            for cert in &self.certificates {
                cert.encode(&mut enc);
            }
        }

        if !self.withdrawals.is_empty() {
            enc.uint(BODY_WITHDRAWALS).map(self.withdrawals.len());
            for withdrawal in &self.withdrawals {
                enc.bytes(&withdrawal.reward_address).uint(withdrawal.lovelace);
            }
        }

        enc.into_bytes()
    }

    /// Transaction id: blake2b-256 of the encoded body
    pub fn hash(&self) -> [u8; 32] {
        blake2b_256(&self.encode())
    }

    /// Deposits paid minus deposits refunded by the certificates
    fn deposit_delta(&self, key_deposit: u64) -> (u64, u64) {
        let mut deposit = 0u64;
        let mut refund = 0u64;
        for cert in &self.certificates {
            match cert {
                Certificate::StakeRegistration { .. } => {
                    deposit = deposit.saturating_add(key_deposit)
                }
                Certificate::StakeDeregistration { .. } => refund = refund.saturating_add(key_deposit),
                Certificate::StakeDelegation { .. } => {}
            }
        }
        (deposit, refund)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VkeyWitness {
    pub vkey: [u8; 32],
    pub signature: [u8; 64],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub body: TxBody,
    pub witnesses: Vec<VkeyWitness>,
}

impl SignedTransaction {
    /// Full transaction: [body, witness set, is_valid, auxiliary data]
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_transaction(&self.body.encode(), &self.witnesses)
    }

    pub fn tx_id(&self) -> String {
        hex::encode(self.body.hash())
    }
}

fn encode_transaction(body: &[u8], witnesses: &[VkeyWitness]) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.array(4).raw(body);

    enc.map(1).uint(WITNESS_VKEYS).array(witnesses.len());
    for witness in witnesses {
        enc.array(2).bytes(&witness.vkey).bytes(&witness.signature);
    }

    enc.bool(true).null();
    enc.into_bytes()
}

/// What a transaction must do, independent of which inputs pay for it
#[derive(Debug, Clone, Default)]
pub struct TxIntent {
    pub outputs: Vec<TxOutput>,
    pub certificates: Vec<Certificate>,
    pub withdrawals: Vec<Withdrawal>,
    /// Inputs are accumulated until they cover this much
    pub selection_target: u64,
}

impl TxIntent {
    /// Certificates and withdrawals need the stake key's signature
    pub fn needs_stake_witness(&self) -> bool {
        !self.certificates.is_empty() || !self.withdrawals.is_empty()
    }
}

/// Balanced, unsigned transaction
#[derive(Debug, Clone)]
pub struct UnsignedTransaction {
    pub body: TxBody,
    pub input_total: u64,
    /// Zero when no change output was added
    pub change: u64,
    pub needs_stake_witness: bool,
}

impl UnsignedTransaction {
    /// Witness the body hash with the payment key, then the stake key when required
    pub fn sign(self, keys: &CardanoSigningKeys) -> SignedTransaction {
        let hash = self.body.hash();

        let mut witnesses = vec![VkeyWitness {
            vkey: keys.payment.verifying_key().to_bytes(),
            signature: keys.payment.sign(&hash).to_bytes(),
        }];
        if self.needs_stake_witness {
            witnesses.push(VkeyWitness {
                vkey: keys.stake.verifying_key().to_bytes(),
                signature: keys.stake.sign(&hash).to_bytes(),
            });
        }

        SignedTransaction {
            body: self.body,
            witnesses,
        }
    }
}

pub struct CardanoTxBuilder {
    params: ProtocolParameters,
    ttl: u64,
    change_address: Vec<u8>,
}

impl CardanoTxBuilder {
    pub fn new(params: ProtocolParameters, tip_slot: u64, change_address: Vec<u8>) -> Self {
        Self {
            params,
            ttl: tip_slot.saturating_add(TTL_WINDOW),
            change_address,
        }
    }

    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// First-fit selection in indexer order, skipping outputs that carry tokens
    pub fn select_inputs(
        &self,
        utxos: &[CardanoUtxo],
        target: u64,
    ) -> Result<(Vec<TxInput>, u64), WalletError> {
        let mut inputs = Vec::new();
        let mut total = 0u64;

        for utxo in utxos.iter().filter(|u| !u.has_assets) {
            inputs.push(TxInput {
                tx_hash: parse_tx_hash(&utxo.tx_hash)?,
                index: utxo.output_index,
            });
            total = total.checked_add(utxo.lovelace).ok_or_else(|| {
                WalletError::InvalidResponse(format!(
                    "output values overflow at {}#{}",
                    utxo.tx_hash, utxo.output_index
                ))
            })?;
            if total >= target {
                break;
            }
        }

        if inputs.is_empty() {
            return Err(WalletError::NoUtxos(
                "no ada-only outputs at payment address".into(),
            ));
        }

        Ok((inputs, total))
    }

    /// Select inputs, price the transaction and balance it with a change output.
    ///
    /// inputs + withdrawals + refunds = outputs + fee + deposits
    pub fn build(
        &self,
        utxos: &[CardanoUtxo],
        intent: &TxIntent,
    ) -> Result<UnsignedTransaction, WalletError> {
        let (inputs, input_total) = self.select_inputs(utxos, intent.selection_target)?;
        let needs_stake_witness = intent.needs_stake_witness();

        let mut body = TxBody {
            inputs,
            outputs: intent.outputs.clone(),
            fee: 0,
            ttl: self.ttl,
            certificates: intent.certificates.clone(),
            withdrawals: intent.withdrawals.clone(),
        };

        let fee = self.estimate_fee(&body, needs_stake_witness)?;
        body.fee = fee;

        let (deposit, refund) = body.deposit_delta(self.params.key_deposit);
        let withdrawn = checked_sum(body.withdrawals.iter().map(|w| w.lovelace));
        let paid_out = checked_sum(body.outputs.iter().map(|o| o.lovelace));

        let available = withdrawn
            .and_then(|w| checked_sum([input_total, w, refund]))
            .ok_or_else(|| {
                WalletError::InvalidResponse("available lovelace overflows".to_string())
            })?;
        let required = paid_out
            .and_then(|p| checked_sum([p, fee, deposit]))
            .ok_or_else(|| {
                WalletError::InsufficientFunds(
                    "outputs, fee and deposit exceed any spendable amount".to_string(),
                )
            })?;

        if available < required {
            return Err(WalletError::InsufficientFunds(format!(
                "Need {} lovelace (outputs {:?}, fee {}, deposit {}), but only have {}",
                required, paid_out, fee, deposit, available
            )));
        }

        let change = available - required;
        if change > 0 {
            body.outputs.push(TxOutput {
                address: self.change_address.clone(),
                lovelace: change,
            });
        }

        log::info!(
            "Built transaction with {} inputs ({} lovelace), fee {}, change {}, ttl {}",
            body.inputs.len(),
            input_total,
            fee,
            change,
            self.ttl
        );

        Ok(UnsignedTransaction {
            body,
            input_total,
            change,
            needs_stake_witness,
        })
    }

    /// Linear fee of an upper-bound draft: widest fee and change fields plus placeholder witnesses
    fn estimate_fee(&self, body: &TxBody, needs_stake_witness: bool) -> Result<u64, WalletError> {
        let mut draft = body.clone();
        draft.fee = u64::MAX;
        draft.outputs.push(TxOutput {
            address: self.change_address.clone(),
            lovelace: u64::MAX,
        });

        let placeholder = VkeyWitness {
            vkey: [0u8; 32],
            signature: [0u8; 64],
        };
        let witness_count = if needs_stake_witness { 2 } else { 1 };
        let size = encode_transaction(&draft.encode(), &vec![placeholder; witness_count]).len();

        self.params.min_fee(size as u64).ok_or_else(|| {
            WalletError::InvalidResponse(format!(
                "fee parameters a={} b={} overflow for {} bytes",
                self.params.min_fee_a, self.params.min_fee_b, size
            ))
        })
    }
}

fn checked_sum(values: impl IntoIterator<Item = u64>) -> Option<u64> {
    values
        .into_iter()
        .try_fold(0u64, |acc, value| acc.checked_add(value))
}

fn parse_tx_hash(tx_hash: &str) -> Result<[u8; 32], WalletError> {
    hex::decode(tx_hash)
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| WalletError::InvalidResponse(format!("Invalid tx hash: {}", tx_hash)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardano::cbor::{self, Value};
    use ed25519_dalek::{Signature, SigningKey, Verifier};

    const PARAMS: ProtocolParameters = ProtocolParameters {
        min_fee_a: 44,
        min_fee_b: 155_381,
        key_deposit: 2_000_000,
    };

    fn utxo(n: u8, lovelace: u64) -> CardanoUtxo {
        CardanoUtxo {
            tx_hash: hex::encode([n; 32]),
            output_index: n as u32,
            lovelace,
            has_assets: false,
        }
    }

    fn builder() -> CardanoTxBuilder {
        CardanoTxBuilder::new(PARAMS, 1_000, vec![0x00; 57])
    }

    fn keys() -> CardanoSigningKeys {
        CardanoSigningKeys {
            payment: SigningKey::from_bytes(&[1u8; 32]),
            stake: SigningKey::from_bytes(&[2u8; 32]),
        }
    }

    fn transfer(amount: u64) -> TxIntent {
        TxIntent {
            outputs: vec![TxOutput {
                address: vec![0x00; 57],
                lovelace: amount,
            }],
            selection_target: amount + 2_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_transfer_balances() {
        let unsigned = builder()
            .build(&[utxo(1, 3_000_000), utxo(2, 5_000_000)], &transfer(4_000_000))
            .unwrap();

        let body = &unsigned.body;
        assert_eq!(body.inputs.len(), 2);
        assert_eq!(body.ttl, 4_600);
        assert!(body.fee >= PARAMS.min_fee(unsigned.clone().sign(&keys()).to_bytes().len() as u64).unwrap());

        let out: u64 = body.outputs.iter().map(|o| o.lovelace).sum();
        assert_eq!(unsigned.input_total, out + body.fee);
        assert_eq!(body.outputs.len(), 2);
        assert_eq!(unsigned.change, body.outputs[1].lovelace);
    }

    #[test]
    fn test_token_outputs_are_skipped() {
        let mut token = utxo(1, 50_000_000);
        token.has_assets = true;

        let unsigned = builder()
            .build(&[token, utxo(2, 9_000_000)], &transfer(1_000_000))
            .unwrap();
        assert_eq!(unsigned.body.inputs.len(), 1);
        assert_eq!(unsigned.body.inputs[0].index, 2);
    }

    #[test]
    fn test_only_token_outputs_is_no_utxos() {
        let mut token = utxo(1, 50_000_000);
        token.has_assets = true;
        assert!(matches!(
            builder().build(&[token], &transfer(1_000_000)),
            Err(WalletError::NoUtxos(_))
        ));
    }

    #[test]
    fn test_insufficient_funds() {
        assert!(matches!(
            builder().build(&[utxo(1, 1_100_000)], &transfer(1_000_000)),
            Err(WalletError::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_extreme_values_are_errors() {
        let err = builder()
            .build(&[utxo(1, u64::MAX - 1), utxo(2, 10)], &TxIntent {
                selection_target: u64::MAX,
                ..transfer(1_000_000)
            })
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidResponse(_)));

        let hostile = CardanoTxBuilder::new(
            ProtocolParameters {
                min_fee_a: u64::MAX,
                ..PARAMS
            },
            1_000,
            vec![0x00; 57],
        );
        let err = hostile
            .build(&[utxo(1, 9_000_000)], &transfer(1_000_000))
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidResponse(_)));

        let huge = TxIntent {
            outputs: vec![TxOutput {
                address: vec![0x00; 57],
                lovelace: u64::MAX,
            }],
            selection_target: u64::MAX,
            ..Default::default()
        };
        let err = builder().build(&[utxo(1, u64::MAX)], &huge).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds(_)));
    }

    #[test]
    fn test_ttl_saturates_at_range_end() {
        let builder = CardanoTxBuilder::new(PARAMS, u64::MAX - 10, vec![0x00; 57]);
        assert_eq!(builder.ttl(), u64::MAX);
    }

    #[test]
    fn test_registration_pays_deposit() {
        let stake_key_hash = [9u8; 28];
        let intent = TxIntent {
            certificates: vec![
                Certificate::StakeRegistration { stake_key_hash },
                Certificate::StakeDelegation {
                    stake_key_hash,
                    pool_key_hash: [7u8; 28],
                },
            ],
            selection_target: 2_500_000,
            ..Default::default()
        };

        let unsigned = builder().build(&[utxo(1, 10_000_000)], &intent).unwrap();
        assert!(unsigned.needs_stake_witness);
        assert_eq!(
            unsigned.input_total,
            unsigned.change + unsigned.body.fee + PARAMS.key_deposit
        );
    }

    #[test]
    fn test_deregistration_refunds_deposit_and_withdraws() {
        let stake_key_hash = [9u8; 28];
        let intent = TxIntent {
            certificates: vec![Certificate::StakeDeregistration { stake_key_hash }],
            withdrawals: vec![Withdrawal {
                reward_address: vec![0xe0; 29],
                lovelace: 1_234,
            }],
            selection_target: 300_000,
            ..Default::default()
        };

        let unsigned = builder().build(&[utxo(1, 1_000_000)], &intent).unwrap();
        assert_eq!(
            unsigned.input_total + 1_234 + PARAMS.key_deposit,
            unsigned.change + unsigned.body.fee
        );
    }

    #[test]
    fn test_body_layout() {
        let intent = TxIntent {
            certificates: vec![Certificate::StakeDelegation {
                stake_key_hash: [9u8; 28],
                pool_key_hash: [7u8; 28],
            }],
            selection_target: 500_000,
            ..Default::default()
        };
        let unsigned = builder().build(&[utxo(3, 4_000_000)], &intent).unwrap();
        let body = cbor::decode(&unsigned.body.encode()).unwrap();

        let inputs = body.get(0).and_then(Value::as_array).unwrap();
        let input = inputs[0].as_array().unwrap();
        assert_eq!(input[0].as_bytes().unwrap(), &[3u8; 32]);
        assert_eq!(input[1].as_uint(), Some(3));

        assert_eq!(body.get(2).and_then(Value::as_uint), Some(unsigned.body.fee));
        assert_eq!(body.get(3).and_then(Value::as_uint), Some(4_600));

        let cert = body.get(4).and_then(Value::as_array).unwrap()[0].clone();
        let cert = cert.as_array().unwrap();
        assert_eq!(cert[0].as_uint(), Some(2));
        assert_eq!(cert[2].as_bytes().unwrap(), &[7u8; 28]);
        assert!(body.get(5).is_none());
    }

    #[test]
    fn test_signing_order_and_validity() {
        let unsigned = builder()
            .build(&[utxo(1, 9_000_000)], &transfer(1_000_000))
            .unwrap();
        let hash = unsigned.body.hash();
        let signed = unsigned.sign(&keys());

        assert_eq!(signed.witnesses.len(), 1);
        let witness = signed.witnesses[0];
        assert_eq!(witness.vkey, keys().payment.verifying_key().to_bytes());
        keys()
            .payment
            .verifying_key()
            .verify(&hash, &Signature::from_bytes(&witness.signature))
            .unwrap();

        let tx = cbor::decode(&signed.to_bytes()).unwrap();
        let parts = tx.as_array().unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[2], Value::Bool(true));
        assert_eq!(parts[3], Value::Null);
        assert_eq!(signed.tx_id(), hex::encode(hash));
    }

    #[test]
    fn test_stake_witness_follows_payment_witness() {
        let intent = TxIntent {
            withdrawals: vec![Withdrawal {
                reward_address: vec![0xe0; 29],
                lovelace: 5_000_000,
            }],
            selection_target: 200_000,
            ..Default::default()
        };
        let signed = builder()
            .build(&[utxo(1, 2_000_000)], &intent)
            .unwrap()
            .sign(&keys());

        assert_eq!(signed.witnesses.len(), 2);
        assert_eq!(
            signed.witnesses[1].vkey,
            keys().stake.verifying_key().to_bytes()
        );
    }

    #[test]
    fn test_bad_tx_hash_is_invalid_response() {
        let mut bad = utxo(1, 5_000_000);
        bad.tx_hash = "xyz".into();
        assert!(matches!(
            builder().build(&[bad], &transfer(1_000_000)),
            Err(WalletError::InvalidResponse(_))
        ));
    }
}
