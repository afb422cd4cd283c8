/// Wallet Service - Orchestration Layer
///
/// Resolves a phone number to its identity and delegates to the chain modules.
/// Money-moving operations return a `TransactionResult` instead of an error.
use chrono::Utc;
use std::sync::Arc;

use crate::balance::{BalanceAggregator, BalanceSnapshot, ExchangeRates};
use crate::bitcoin::{self as btc, BitcoinLedger};
use crate::cardano::{self as ada, BlockfrostClient, CardanoLedger, CardanoSubmission, StakeRewards};
use crate::config::WalletConfig;
use crate::error::{StorageError, WalletError};
use crate::fiat::{FiatLedger, InMemoryFiatLedger};
use crate::keys::{KeyManager, WalletAddresses, WalletIdentity};
use crate::lightning::{
    self as ln, Channel, ChannelNode, DecodedInvoice, Invoice, LnbitsClient, Payment,
    DEFAULT_HISTORY_LIMIT, DEFAULT_INVOICE_EXPIRY,
};
use crate::storage::{FileStore, WalletRecord, WalletStore};
use crate::types::{TransactionReceipt, TransactionResult};

const PHONE_MIN_DIGITS: usize = 8;
const PHONE_MAX_DIGITS: usize = 15;

pub struct WalletService {
    config: WalletConfig,
    keys: KeyManager,
    store: Arc<dyn WalletStore>,
    bitcoin: Arc<dyn BitcoinLedger>,
    cardano: Arc<dyn CardanoLedger>,
    channel: Arc<dyn ChannelNode>,
    fiat: Arc<dyn FiatLedger>,
    aggregator: BalanceAggregator,
}

impl WalletService {
    // ============================================================================
    // Constructors
    // ============================================================================

    /// Build every client from the configuration, storing records under "./wallets"
    pub fn new(config: WalletConfig) -> Self {
        Self::new_with_store(config, Arc::new(FileStore::new()))
    }

    /// Create the service with a custom record store (for testing)
    pub fn new_with_store(config: WalletConfig, store: Arc<dyn WalletStore>) -> Self {
        let bitcoin = btc::ledger_from_config(&config);
        let cardano: Arc<dyn CardanoLedger> = Arc::new(BlockfrostClient::new(
            &config.blockfrost_url,
            &config.blockfrost_project_id,
        ));
        let channel: Arc<dyn ChannelNode> = Arc::new(LnbitsClient::new(
            &config.channel_node_url,
            &config.channel_node_api_key,
        ));
        let fiat: Arc<dyn FiatLedger> = Arc::new(InMemoryFiatLedger::new());

        Self::with_backends(config, store, bitcoin, cardano, channel, fiat)
    }

    /// Assemble the service from explicit collaborators
    pub fn with_backends(
        config: WalletConfig,
        store: Arc<dyn WalletStore>,
        bitcoin: Arc<dyn BitcoinLedger>,
        cardano: Arc<dyn CardanoLedger>,
        channel: Arc<dyn ChannelNode>,
        fiat: Arc<dyn FiatLedger>,
    ) -> Self {
        let aggregator = BalanceAggregator::new(
            bitcoin.clone(),
            cardano.clone(),
            channel.clone(),
            fiat.clone(),
            ExchangeRates::from_config(&config),
        );

        Self {
            keys: KeyManager::new(&config),
            config,
            store,
            bitcoin,
            cardano,
            channel,
            fiat,
            aggregator,
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn fiat_ledger(&self) -> Arc<dyn FiatLedger> {
        self.fiat.clone()
    }

    // ============================================================================
    // Wallet Management
    // ============================================================================

    /// Provision a wallet for a phone number that has none yet
    pub fn create_wallet(&self, phone_number: &str) -> Result<WalletAddresses, WalletError> {
        validate_phone(phone_number)?;

        if self.store.exists(phone_number)? {
            return Err(WalletError::WalletExists(phone_number.to_string()));
        }

        let identity = self.keys.derive_wallet()?;
        let record = WalletRecord::new(phone_number, &identity);
        self.store.insert_new(&record).map_err(|e| match e {
            StorageError::AlreadyExists(_) => WalletError::WalletExists(phone_number.to_string()),
            other => other.into(),
        })?;

        log::info!("Created wallet {} for {}", identity.wallet_id, phone_number);
        Ok(identity.addresses())
    }

    pub fn wallet_exists(&self, phone_number: &str) -> Result<bool, WalletError> {
        Ok(self.store.exists(phone_number)?)
    }

    pub fn list_wallets(&self) -> Result<Vec<String>, WalletError> {
        Ok(self.store.list()?)
    }

    pub fn delete_wallet(&self, phone_number: &str) -> Result<(), WalletError> {
        self.store.delete(phone_number).map_err(|e| match e {
            StorageError::NotFound(_) => WalletError::WalletNotFound(phone_number.to_string()),
            other => other.into(),
        })
    }

    /// Public addresses as recorded for the wallet
    pub fn addresses(&self, phone_number: &str) -> Result<WalletAddresses, WalletError> {
        Ok(self.load_record(phone_number)?.addresses())
    }

    /// Re-derive the identity from the stored mnemonics.
    ///
    /// Fails with a derivation error if the keys no longer produce the stored addresses.
    pub fn load_identity(&self, phone_number: &str) -> Result<WalletIdentity, WalletError> {
        let record = self.load_record(phone_number)?;
        let identity = self.keys.restore_wallet(
            &record.wallet_id,
            &record.bitcoin_mnemonic,
            &record.cardano_mnemonic,
        )?;

        if identity.addresses() != record.addresses() {
            return Err(WalletError::Derivation(format!(
                "stored addresses of {} do not match its mnemonics",
                record.wallet_id
            )));
        }

        Ok(identity)
    }

    fn load_record(&self, phone_number: &str) -> Result<WalletRecord, WalletError> {
        self.store.load(phone_number).map_err(|e| match e {
            StorageError::NotFound(_) => WalletError::WalletNotFound(phone_number.to_string()),
            other => other.into(),
        })
    }

    // ============================================================================
    // Balance
    // ============================================================================

    pub async fn get_balance(&self, phone_number: &str) -> Result<BalanceSnapshot, WalletError> {
        let identity = self.load_identity(phone_number)?;
        Ok(self.aggregator.get_balance(&identity).await)
    }

    // ============================================================================
    // Bitcoin
    // ============================================================================

    /// Send sats on-chain. Uses the configured fee rate when `fee_rate` is `None`.
    pub async fn send_bitcoin(
        &self,
        phone_number: &str,
        recipient: &str,
        amount_sats: u64,
        fee_rate: Option<u64>,
    ) -> TransactionResult {
        let fee_rate = fee_rate.unwrap_or(self.config.default_fee_rate);
        let result: Result<TransactionReceipt, WalletError> = async {
            let identity = self.load_identity(phone_number)?;
            let transfer = btc::send_bitcoin(
                self.bitcoin.as_ref(),
                &identity.bitcoin,
                recipient,
                amount_sats,
                fee_rate,
            )
            .await?;
            Ok(TransactionReceipt {
                tx_hash: Some(transfer.txid),
                fee: Some(transfer.plan.fee),
                ..Default::default()
            })
        }
        .await;

        TransactionResult::from_result("Bitcoin transfer", result)
    }

    // ============================================================================
    // Cardano
    // ============================================================================

    pub async fn send_ada(
        &self,
        phone_number: &str,
        recipient: &str,
        amount_lovelace: u64,
    ) -> TransactionResult {
        let result: Result<CardanoSubmission, WalletError> = async {
            let identity = self.load_identity(phone_number)?;
            ada::send_ada(
                self.cardano.as_ref(),
                &identity.cardano,
                recipient,
                amount_lovelace,
            )
            .await
        }
        .await;

        TransactionResult::from_result("ADA transfer", result.map(submission_receipt))
    }

    pub async fn delegate_stake(&self, phone_number: &str, pool_id: &str) -> TransactionResult {
        let result: Result<CardanoSubmission, WalletError> = async {
            let identity = self.load_identity(phone_number)?;
            ada::delegate_stake(self.cardano.as_ref(), &identity.cardano, pool_id).await
        }
        .await;

        TransactionResult::from_result("Stake delegation", result.map(submission_receipt))
    }

    pub async fn withdraw_rewards(&self, phone_number: &str) -> TransactionResult {
        let result: Result<CardanoSubmission, WalletError> = async {
            let identity = self.load_identity(phone_number)?;
            ada::withdraw_rewards(self.cardano.as_ref(), &identity.cardano).await
        }
        .await;

        TransactionResult::from_result("Reward withdrawal", result.map(submission_receipt))
    }

    /// Deregister the stake key, reclaiming the deposit and remaining rewards
    pub async fn unstake(&self, phone_number: &str) -> TransactionResult {
        let result: Result<CardanoSubmission, WalletError> = async {
            let identity = self.load_identity(phone_number)?;
            ada::deregister_stake(self.cardano.as_ref(), &identity.cardano).await
        }
        .await;

        TransactionResult::from_result("Stake deregistration", result.map(submission_receipt))
    }

    pub async fn stake_rewards(&self, phone_number: &str) -> Result<StakeRewards, WalletError> {
        let identity = self.load_identity(phone_number)?;
        ada::stake_rewards(self.cardano.as_ref(), &identity.cardano).await
    }

    // ============================================================================
    // Lightning
    // ============================================================================

    pub async fn create_invoice(
        &self,
        amount_sats: u64,
        description: &str,
        expiry_secs: Option<u64>,
    ) -> Result<Invoice, WalletError> {
        self.channel
            .create_invoice(
                amount_sats,
                description,
                expiry_secs.unwrap_or(DEFAULT_INVOICE_EXPIRY),
            )
            .await
    }

    /// Pay a payment request after checking it has not expired
    pub async fn pay_invoice(&self, payment_request: &str) -> TransactionResult {
        let result: Result<TransactionReceipt, WalletError> = async {
            let decoded = self.channel.decode_invoice(payment_request).await?;
            match decoded.expires_at() {
                Some(expires_at) if Utc::now() < expires_at => {}
                _ => {
                    return Err(WalletError::PaymentFailed(format!(
                        "invoice {} has expired",
                        decoded.payment_hash
                    )))
                }
            }

            let payment_hash = self.channel.pay_invoice(payment_request).await?;
            Ok(TransactionReceipt {
                payment_hash: Some(payment_hash),
                payment_request: Some(payment_request.to_string()),
                ..Default::default()
            })
        }
        .await;

        TransactionResult::from_result("Lightning payment", result)
    }

    /// Pay an invoice this service issued, refusing it once paid or expired
    pub async fn pay_known_invoice(&self, invoice: &Invoice) -> TransactionResult {
        let result = ln::pay_invoice(self.channel.as_ref(), invoice)
            .await
            .map(|payment_hash| TransactionReceipt {
                payment_hash: Some(payment_hash),
                payment_request: Some(invoice.payment_request.clone()),
                ..Default::default()
            });

        TransactionResult::from_result("Lightning payment", result)
    }

    pub async fn check_invoice(&self, invoice: &mut Invoice) -> Result<bool, WalletError> {
        ln::refresh_invoice(self.channel.as_ref(), invoice).await
    }

    pub async fn decode_invoice(&self, payment_request: &str) -> Result<DecodedInvoice, WalletError> {
        self.channel.decode_invoice(payment_request).await
    }

    pub async fn payment_history(&self, limit: Option<usize>) -> Result<Vec<Payment>, WalletError> {
        self.channel
            .payment_history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>, WalletError> {
        self.channel.list_channels().await
    }

    pub async fn open_channel(
        &self,
        node_pubkey: &str,
        local_amount_sats: u64,
        push_amount_sats: u64,
    ) -> TransactionResult {
        let result = self
            .channel
            .open_channel(node_pubkey, local_amount_sats, push_amount_sats)
            .await
            .map(|funding_txid| TransactionReceipt {
                tx_hash: Some(funding_txid),
                ..Default::default()
            });

        TransactionResult::from_result("Channel open", result)
    }

    pub async fn close_channel(&self, channel_id: &str, force: bool) -> TransactionResult {
        let result = self
            .channel
            .close_channel(channel_id, force)
            .await
            .map(|closing_txid| TransactionReceipt {
                tx_hash: Some(closing_txid),
                ..Default::default()
            });

        TransactionResult::from_result("Channel close", result)
    }
}

fn submission_receipt(submission: CardanoSubmission) -> TransactionReceipt {
    TransactionReceipt {
        tx_hash: Some(submission.tx_id),
        fee: Some(submission.fee),
        ..Default::default()
    }
}

/// `+` followed by 8 to 15 digits
pub fn validate_phone(phone_number: &str) -> Result<(), WalletError> {
    let valid = phone_number
        .strip_prefix('+')
        .map(|digits| {
            (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len())
                && digits.chars().all(|c| c.is_ascii_digit())
        })
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(WalletError::InvalidInput(format!(
            "Invalid phone number: {:?}",
            phone_number
        )))
    }
}
