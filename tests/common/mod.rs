//! Shared setup for integration tests
//!
//! Every test gets its own in-memory ledger mock on an ephemeral port and a
//! wallet service pointed at it.

#![allow(dead_code)]

use ledger_mock::{MockLedger, DEFAULT_API_KEY};
use std::net::SocketAddr;
use std::sync::Arc;
use ussd_wallet_core::{
    BitcoinIndexer, CardanoNetwork, InMemoryFiatLedger, MemoryStore, WalletAddresses,
    WalletConfig, WalletService, WalletStore,
};

pub const PHONE: &str = "+254712345678";
pub const OTHER_PHONE: &str = "+254798765432";

/// Testnet P2WPKH address owned by nobody in the tests
pub const EXTERNAL_BTC_ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

pub const ADA_RATE: f64 = 71.53;
pub const BTC_RATE: f64 = 5_000_000.0;

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

pub struct TestEnv {
    pub ledger: MockLedger,
    pub addr: SocketAddr,
    pub config: WalletConfig,
    pub store: Arc<dyn WalletStore>,
    pub service: WalletService,
}

/// Configuration pointing every client at the mock on `addr`
pub fn mock_config(addr: SocketAddr) -> WalletConfig {
    let base = format!("http://{}", addr);
    WalletConfig {
        bitcoin_network: bitcoin::Network::Testnet,
        bitcoin_coin_type: 1,
        bitcoin_indexer: BitcoinIndexer::Esplora,
        esplora_url: format!("{}/esplora", base),
        blockchain_info_url: format!("{}/blockchain", base),
        default_fee_rate: 5,
        cardano_network: CardanoNetwork::Preview,
        cardano_coin_type: 1815,
        blockfrost_url: format!("{}/blockfrost", base),
        blockfrost_project_id: "previewMockProject".to_string(),
        channel_node_url: format!("{}/lnbits", base),
        channel_node_api_key: DEFAULT_API_KEY.to_string(),
        ada_fiat_rate: ADA_RATE,
        btc_fiat_rate: Some(BTC_RATE),
    }
}

pub async fn setup() -> anyhow::Result<TestEnv> {
    setup_with(|_| {}).await
}

/// Like `setup`, with a chance to adjust the configuration first
pub async fn setup_with(adjust: impl FnOnce(&mut WalletConfig)) -> anyhow::Result<TestEnv> {
    init_logger();

    let ledger = MockLedger::new(bitcoin::Network::Testnet);
    let addr = ledger.spawn().await?;

    let mut config = mock_config(addr);
    adjust(&mut config);

    let store: Arc<dyn WalletStore> = Arc::new(MemoryStore::new());
    let service = WalletService::new_with_store(config.clone(), store.clone());

    Ok(TestEnv {
        ledger,
        addr,
        config,
        store,
        service,
    })
}

impl TestEnv {
    pub fn create_wallet(&self, phone: &str) -> anyhow::Result<WalletAddresses> {
        Ok(self.service.create_wallet(phone)?)
    }

    /// Service sharing this env's ledger and store but with its own fiat ledger handle
    pub fn service_with_fiat(&self, fiat: Arc<InMemoryFiatLedger>) -> WalletService {
        use ussd_wallet_core::bitcoin::ledger_from_config;
        use ussd_wallet_core::cardano::BlockfrostClient;
        use ussd_wallet_core::lightning::LnbitsClient;

        WalletService::with_backends(
            self.config.clone(),
            self.store.clone(),
            ledger_from_config(&self.config),
            Arc::new(BlockfrostClient::new(
                &self.config.blockfrost_url,
                &self.config.blockfrost_project_id,
            )),
            Arc::new(LnbitsClient::new(
                &self.config.channel_node_url,
                &self.config.channel_node_api_key,
            )),
            fiat,
        )
    }
}
