/// In-memory ledger state shared by every mocked API
///
/// Bitcoin outputs are funded by real serialized transactions so that clients can
/// fetch and check them like they would on a public indexer.

use anyhow::{Context, Result};
use bitcoin::hashes::{sha256, sha256d, Hash};
use bitcoin::{
    absolute, transaction, Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction,
    TxIn, TxOut, Txid, Witness,
};
use blake2::{Blake2b, Digest};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{Amount as AssetAmount, ChannelEntry, PaymentEntry};

type Blake2b256 = Blake2b<typenum::U32>;

/// API key the LNbits endpoints accept unless configured otherwise
pub const DEFAULT_API_KEY: &str = "mock-admin-key";

pub const EPOCH_LENGTH_SECS: i64 = 432_000;

#[derive(Debug, Clone)]
pub struct BitcoinOutput {
    pub txid: String,
    pub vout: u32,
    pub value: u64,
    pub script_hex: String,
}

#[derive(Debug, Clone)]
pub struct CardanoOutput {
    pub tx_hash: String,
    pub output_index: u32,
    pub amount: Vec<AssetAmount>,
}

impl CardanoOutput {
    pub fn lovelace(&self) -> u64 {
        self.amount
            .iter()
            .find(|a| a.unit == "lovelace")
            .and_then(|a| a.quantity.parse().ok())
            .unwrap_or(0)
    }
}

/// Reward account of a stake address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StakeAccountState {
    pub active: bool,
    pub controlled_amount: u64,
    pub rewards_sum: u64,
    pub withdrawable_amount: u64,
    pub pool_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MockInvoice {
    pub payment_hash: String,
    pub payment_request: String,
    pub amount_sats: u64,
    pub memo: String,
    pub created: i64,
    pub expiry: u64,
    pub paid: bool,
}

impl MockInvoice {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.created + self.expiry as i64
    }
}

#[derive(Debug)]
pub struct LedgerState {
    pub network: Network,
    pub api_key: String,
    pub tip_height: u64,
    pub bitcoin_txs: HashMap<String, String>,
    pub bitcoin_outputs: HashMap<String, Vec<BitcoinOutput>>,
    pub broadcasts: Vec<String>,
    pub fail_broadcast: bool,
    pub cardano_outputs: HashMap<String, Vec<CardanoOutput>>,
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub key_deposit: u64,
    pub slot: u64,
    pub epoch: u64,
    pub epoch_start: i64,
    pub accounts: HashMap<String, StakeAccountState>,
    pub submissions: Vec<Vec<u8>>,
    pub channel_balance: u64,
    pub channel_down: bool,
    pub fail_payments: bool,
    pub invoices: HashMap<String, MockInvoice>,
    pub payments: Vec<PaymentEntry>,
    pub channels: Vec<ChannelEntry>,
    pub calls: Vec<String>,
    counter: u64,
}

impl LedgerState {
    fn new(network: Network) -> Self {
        Self {
            network,
            api_key: DEFAULT_API_KEY.to_string(),
            tip_height: 850_000,
            bitcoin_txs: HashMap::new(),
            bitcoin_outputs: HashMap::new(),
            broadcasts: Vec::new(),
            fail_broadcast: false,
            cardano_outputs: HashMap::new(),
            min_fee_a: 44,
            min_fee_b: 155_381,
            key_deposit: 2_000_000,
            slot: 50_000_000,
            epoch: 500,
            epoch_start: now_unix() - EPOCH_LENGTH_SECS / 2,
            accounts: HashMap::new(),
            submissions: Vec::new(),
            channel_balance: 0,
            channel_down: false,
            fail_payments: false,
            invoices: HashMap::new(),
            payments: Vec::new(),
            channels: Vec::new(),
            calls: Vec::new(),
            counter: 0,
        }
    }

    /// Fresh deterministic 32-byte value, unique within this ledger
    pub fn next_hash(&mut self) -> [u8; 32] {
        self.counter += 1;
        sha256d::Hash::hash(&self.counter.to_le_bytes()).to_byte_array()
    }

    pub fn next_txid(&mut self) -> String {
        Txid::from_raw_hash(sha256d::Hash::from_byte_array(self.next_hash())).to_string()
    }

    /// Accept a signed transaction: spend its inputs and index its outputs
    pub fn apply_bitcoin_tx(&mut self, tx_hex: &str) -> Result<String> {
        let bytes = hex::decode(tx_hex.trim()).context("transaction is not hex")?;
        let tx: Transaction =
            bitcoin::consensus::deserialize(&bytes).context("TX decode failed")?;
        let txid = tx.compute_txid().to_string();

        for input in &tx.input {
            let spent_txid = input.previous_output.txid.to_string();
            let spent_vout = input.previous_output.vout;
            let owner = self.bitcoin_outputs.iter().find_map(|(address, outputs)| {
                outputs
                    .iter()
                    .any(|o| o.txid == spent_txid && o.vout == spent_vout)
                    .then(|| address.clone())
            });
            let Some(owner) = owner else {
                anyhow::bail!("bad-txns-inputs-missingorspent {}:{}", spent_txid, spent_vout);
            };
            if let Some(outputs) = self.bitcoin_outputs.get_mut(&owner) {
                outputs.retain(|o| !(o.txid == spent_txid && o.vout == spent_vout));
            }
        }

        for (vout, output) in tx.output.iter().enumerate() {
            if let Ok(address) = Address::from_script(&output.script_pubkey, self.network) {
                self.bitcoin_outputs
                    .entry(address.to_string())
                    .or_default()
                    .push(BitcoinOutput {
                        txid: txid.clone(),
                        vout: vout as u32,
                        value: output.value.to_sat(),
                        script_hex: output.script_pubkey.to_hex_string(),
                    });
            }
        }

        self.bitcoin_txs.insert(txid.clone(), tx_hex.trim().to_string());
        self.broadcasts.push(txid.clone());
        log::info!("Accepted transaction {}", txid);
        Ok(txid)
    }

    pub fn add_invoice(&mut self, amount_sats: u64, memo: &str, created: i64, expiry: u64) -> MockInvoice {
        let payment_hash = hex::encode(self.next_hash());
        let invoice = MockInvoice {
            payment_request: format!("lnbcrt{}n1p{}", amount_sats, &payment_hash[..24]),
            payment_hash,
            amount_sats,
            memo: memo.to_string(),
            created,
            expiry,
            paid: false,
        };
        self.invoices
            .insert(invoice.payment_request.clone(), invoice.clone());
        invoice
    }
}

/// Handle to a mocked ledger, shared between the server and the test driving it
#[derive(Clone)]
pub struct MockLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MockLedger {
    pub fn new(network: Network) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState::new(network))),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pay `value` sats to `address` in a new transaction, returning its outpoint
    pub fn fund_bitcoin(&self, address: &str, value: u64) -> Result<(String, u32)> {
        let address = Address::from_str(address)
            .context("Invalid address")?
            .assume_checked();
        let mut state = self.state();

        let previous = Txid::from_raw_hash(sha256d::Hash::from_byte_array(state.next_hash()));
        let tx = Transaction {
            version: transaction::Version::TWO,
            lock_time: absolute::LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: previous,
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(value),
                script_pubkey: address.script_pubkey(),
            }],
        };

        let txid = tx.compute_txid().to_string();
        state
            .bitcoin_txs
            .insert(txid.clone(), bitcoin::consensus::encode::serialize_hex(&tx));
        state
            .bitcoin_outputs
            .entry(address.to_string())
            .or_default()
            .push(BitcoinOutput {
                txid: txid.clone(),
                vout: 0,
                value,
                script_hex: address.script_pubkey().to_hex_string(),
            });

        log::info!("Funded {} with {} sats in {}", address, value, txid);
        Ok((txid, 0))
    }

    pub fn bitcoin_balance(&self, address: &str) -> u64 {
        self.state()
            .bitcoin_outputs
            .get(address)
            .map(|outputs| outputs.iter().map(|o| o.value).sum())
            .unwrap_or(0)
    }

    /// Add an ada-only output at `address`, returning its tx hash
    pub fn fund_cardano(&self, address: &str, lovelace: u64) -> String {
        self.fund_cardano_with_assets(address, lovelace, Vec::new())
    }

    /// Add an output carrying native tokens as (unit, quantity) pairs
    pub fn fund_cardano_with_assets(
        &self,
        address: &str,
        lovelace: u64,
        assets: Vec<(String, u64)>,
    ) -> String {
        let mut state = self.state();
        let tx_hash = hex::encode(Blake2b256::digest(state.next_hash()));

        let mut amount = vec![AssetAmount {
            unit: "lovelace".to_string(),
            quantity: lovelace.to_string(),
        }];
        amount.extend(assets.into_iter().map(|(unit, quantity)| AssetAmount {
            unit,
            quantity: quantity.to_string(),
        }));

        state
            .cardano_outputs
            .entry(address.to_string())
            .or_default()
            .push(CardanoOutput {
                tx_hash: tx_hash.clone(),
                output_index: 0,
                amount,
            });
        tx_hash
    }

    pub fn set_stake_account(&self, stake_address: &str, account: StakeAccountState) {
        self.state()
            .accounts
            .insert(stake_address.to_string(), account);
    }

    pub fn set_channel_balance(&self, sats: u64) {
        self.state().channel_balance = sats;
    }

    /// Make every LNbits endpoint answer 503
    pub fn set_channel_down(&self, down: bool) {
        self.state().channel_down = down;
    }

    /// Make every outgoing payment fail with a routing error
    pub fn set_payment_failure(&self, fail: bool) {
        self.state().fail_payments = fail;
    }

    /// Make Bitcoin broadcasts fail on both indexers
    pub fn set_broadcast_failure(&self, fail: bool) {
        self.state().fail_broadcast = fail;
    }

    /// Register an invoice as if issued at `created` (unix seconds), returning its payment request
    pub fn add_invoice(&self, amount_sats: u64, memo: &str, created: i64, expiry: u64) -> String {
        self.state()
            .add_invoice(amount_sats, memo, created, expiry)
            .payment_request
    }

    /// Mark the invoice with `payment_hash` as settled by its payer
    pub fn settle_invoice(&self, payment_hash: &str) -> bool {
        let mut state = self.state();
        let Some(invoice) = state
            .invoices
            .values_mut()
            .find(|i| i.payment_hash == payment_hash)
        else {
            return false;
        };
        invoice.paid = true;
        let entry = PaymentEntry {
            payment_hash: invoice.payment_hash.clone(),
            amount: invoice.amount_sats as i64 * 1_000,
            memo: invoice.memo.clone(),
            pending: false,
            time: now_unix(),
        };
        let amount = invoice.amount_sats;
        state.channel_balance += amount;
        state.payments.push(entry);
        true
    }

    /// "METHOD /path" of every request served so far
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn called(&self, fragment: &str) -> bool {
        self.state().calls.iter().any(|c| c.contains(fragment))
    }

    pub fn broadcasts(&self) -> Vec<String> {
        self.state().broadcasts.clone()
    }

    pub fn bitcoin_transaction(&self, txid: &str) -> Option<String> {
        self.state().bitcoin_txs.get(txid).cloned()
    }

    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.state().submissions.clone()
    }

    pub(crate) fn record_call(&self, call: String) {
        self.state().calls.push(call);
    }
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Payment hash for a request the mock did not issue
pub fn foreign_payment_hash(payment_request: &str) -> String {
    sha256::Hash::hash(payment_request.as_bytes()).to_string()
}

/// Blake2b-256 transaction id of a submitted Cardano transaction
pub fn cardano_tx_id(tx: &[u8]) -> Option<String> {
    crate::cbor::transaction_body(tx).map(|body| hex::encode(Blake2b256::digest(body)))
}
