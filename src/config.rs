/// Wallet configuration from environment variables
///
/// Selects the Bitcoin and Cardano networks, the indexers used for each chain,
/// the channel node and the fixed display conversion rates.
/// Defaults to the test networks.

use std::env;
use std::str::FromStr;

use crate::error::WalletError;

/// Cardano network flavour. Preprod and Preview share network id 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardanoNetwork {
    Mainnet,
    Preprod,
    Preview,
}

impl CardanoNetwork {
    /// Network id embedded in address header bytes
    pub fn network_id(&self) -> u8 {
        match self {
            CardanoNetwork::Mainnet => 1,
            CardanoNetwork::Preprod | CardanoNetwork::Preview => 0,
        }
    }

    pub fn address_hrp(&self) -> &'static str {
        match self {
            CardanoNetwork::Mainnet => "addr",
            _ => "addr_test",
        }
    }

    pub fn stake_hrp(&self) -> &'static str {
        match self {
            CardanoNetwork::Mainnet => "stake",
            _ => "stake_test",
        }
    }

    pub fn default_blockfrost_url(&self) -> &'static str {
        match self {
            CardanoNetwork::Mainnet => "https://cardano-mainnet.blockfrost.io/api/v0",
            CardanoNetwork::Preprod => "https://cardano-preprod.blockfrost.io/api/v0",
            CardanoNetwork::Preview => "https://cardano-preview.blockfrost.io/api/v0",
        }
    }
}

/// Which response shape the Bitcoin indexer speaks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitcoinIndexer {
    /// blockstream.info / mempool.space style API
    Esplora,
    /// blockchain.info API (mainnet)
    BlockchainInfo,
}

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Bitcoin network type (for bitcoin crate)
    pub bitcoin_network: bitcoin::Network,
    /// BIP44 coin type used in the BIP84 path
    pub bitcoin_coin_type: u32,
    pub bitcoin_indexer: BitcoinIndexer,
    /// Esplora API base URL
    pub esplora_url: String,
    /// blockchain.info API base URL
    pub blockchain_info_url: String,
    /// Default on-chain fee rate in sat/byte
    pub default_fee_rate: u64,
    pub cardano_network: CardanoNetwork,
    /// Coin type used in the CIP-1852 style path
    pub cardano_coin_type: u32,
    pub blockfrost_url: String,
    pub blockfrost_project_id: String,
    /// Lightning node REST endpoint
    pub channel_node_url: String,
    pub channel_node_api_key: String,
    /// Fiat units per ADA. Fixed display multiplier, not a market feed.
    pub ada_fiat_rate: f64,
    /// Fiat units per BTC, when configured
    pub btc_fiat_rate: Option<f64>,
}

impl WalletConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `BTC_NETWORK`: "testnet" (default), "mainnet", "signet" or "regtest"
    /// - `BTC_COIN_TYPE`: overrides the coin type derived from the network
    /// - `BTC_INDEXER`: "esplora" or "blockchain-info" (mainnet default)
    /// - `ESPLORA_URL` / `BLOCKCHAIN_INFO_URL`: indexer endpoints
    /// - `BTC_FEE_RATE`: default sat/byte fee rate (5)
    /// - `CARDANO_NETWORK`: "preview" (default), "preprod" or "mainnet"
    /// - `CARDANO_COIN_TYPE`: defaults to 1815
    /// - `BLOCKFROST_URL` / `BLOCK_KEY`: Blockfrost endpoint and project id
    /// - `LN_API_URL` / `LN_API_KEY`: channel node endpoint and key
    /// - `ADA_FIAT_RATE` (71.53) / `BTC_FIAT_RATE` (unset)
    ///
    /// # Examples
    ///
    /// ```bash
    /// BTC_NETWORK=regtest ESPLORA_URL=http://localhost:3000/esplora cargo test
    /// ```
    pub fn from_env() -> Result<Self, WalletError> {
        dotenv::dotenv().ok();

        let network_str = env::var("BTC_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .to_lowercase();

        let bitcoin_network = match network_str.as_str() {
            "mainnet" | "bitcoin" => {
                log::info!("Using Bitcoin MAINNET");
                bitcoin::Network::Bitcoin
            }
            "testnet" | "" => bitcoin::Network::Testnet,
            "signet" => bitcoin::Network::Signet,
            "regtest" => {
                log::info!("Using Bitcoin REGTEST");
                bitcoin::Network::Regtest
            }
            other => {
                log::warn!("Unknown Bitcoin network '{}', defaulting to testnet", other);
                bitcoin::Network::Testnet
            }
        };

        let bitcoin_coin_type = match env::var("BTC_COIN_TYPE") {
            Ok(raw) => parse_var("BTC_COIN_TYPE", &raw)?,
            Err(_) => default_coin_type(bitcoin_network),
        };

        let bitcoin_indexer = match env::var("BTC_INDEXER").ok().as_deref() {
            Some("esplora") => BitcoinIndexer::Esplora,
            Some("blockchain-info") | Some("blockchain_info") => BitcoinIndexer::BlockchainInfo,
            Some(other) => {
                log::warn!("Unknown Bitcoin indexer '{}', using network default", other);
                default_indexer(bitcoin_network)
            }
            None => default_indexer(bitcoin_network),
        };

        let esplora_url = env::var("ESPLORA_URL")
            .unwrap_or_else(|_| default_esplora_url(bitcoin_network).to_string());
        let blockchain_info_url = env::var("BLOCKCHAIN_INFO_URL")
            .unwrap_or_else(|_| "https://blockchain.info".to_string());

        let default_fee_rate = match env::var("BTC_FEE_RATE") {
            Ok(raw) => parse_var("BTC_FEE_RATE", &raw)?,
            Err(_) => 5,
        };

        let cardano_network = match env::var("CARDANO_NETWORK")
            .unwrap_or_else(|_| "preview".to_string())
            .to_lowercase()
            .as_str()
        {
            "mainnet" => CardanoNetwork::Mainnet,
            "preprod" => CardanoNetwork::Preprod,
            "preview" | "" => CardanoNetwork::Preview,
            other => {
                log::warn!("Unknown Cardano network '{}', defaulting to preview", other);
                CardanoNetwork::Preview
            }
        };

        let cardano_coin_type = match env::var("CARDANO_COIN_TYPE") {
            Ok(raw) => parse_var("CARDANO_COIN_TYPE", &raw)?,
            Err(_) => 1815,
        };

        let blockfrost_url = env::var("BLOCKFROST_URL")
            .unwrap_or_else(|_| cardano_network.default_blockfrost_url().to_string());
        let blockfrost_project_id = env::var("BLOCK_KEY").unwrap_or_else(|_| {
            log::warn!("BLOCK_KEY not set, Blockfrost requests will be rejected");
            String::new()
        });

        let channel_node_url =
            env::var("LN_API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let channel_node_api_key = env::var("LN_API_KEY").unwrap_or_default();

        let ada_fiat_rate = match env::var("ADA_FIAT_RATE") {
            Ok(raw) => parse_var("ADA_FIAT_RATE", &raw)?,
            Err(_) => 71.53,
        };
        let btc_fiat_rate = match env::var("BTC_FIAT_RATE") {
            Ok(raw) => Some(parse_var("BTC_FIAT_RATE", &raw)?),
            Err(_) => None,
        };

        log::info!(
            "Bitcoin network {:?} via {:?}, Cardano {:?}, channel node {}",
            bitcoin_network,
            bitcoin_indexer,
            cardano_network,
            channel_node_url
        );

        Ok(Self {
            bitcoin_network,
            bitcoin_coin_type,
            bitcoin_indexer,
            esplora_url,
            blockchain_info_url,
            default_fee_rate,
            cardano_network,
            cardano_coin_type,
            blockfrost_url,
            blockfrost_project_id,
            channel_node_url,
            channel_node_api_key,
            ada_fiat_rate,
            btc_fiat_rate,
        })
    }

    /// BIP84 path of the single receive key: m/84'/coin'/0'/0/0
    pub fn bitcoin_derivation_path(&self) -> String {
        format!("m/84'/{}'/0'/0/0", self.bitcoin_coin_type)
    }

    /// Payment key path: m/1852'/coin'/0'/0'/0'
    pub fn cardano_payment_path(&self) -> String {
        format!("m/1852'/{}'/0'/0'/0'", self.cardano_coin_type)
    }

    /// Stake key path: m/1852'/coin'/0'/2'/0'
    pub fn cardano_stake_path(&self) -> String {
        format!("m/1852'/{}'/0'/2'/0'", self.cardano_coin_type)
    }
}

impl Default for WalletConfig {
    /// Default configuration (Bitcoin testnet, Cardano preview)
    fn default() -> Self {
        Self {
            bitcoin_network: bitcoin::Network::Testnet,
            bitcoin_coin_type: 1,
            bitcoin_indexer: BitcoinIndexer::Esplora,
            esplora_url: default_esplora_url(bitcoin::Network::Testnet).to_string(),
            blockchain_info_url: "https://blockchain.info".to_string(),
            default_fee_rate: 5,
            cardano_network: CardanoNetwork::Preview,
            cardano_coin_type: 1815,
            blockfrost_url: CardanoNetwork::Preview.default_blockfrost_url().to_string(),
            blockfrost_project_id: String::new(),
            channel_node_url: "http://localhost:8080".to_string(),
            channel_node_api_key: String::new(),
            ada_fiat_rate: 71.53,
            btc_fiat_rate: None,
        }
    }
}

/// Mainnet uses coin type 0, every test network uses 1
fn default_coin_type(network: bitcoin::Network) -> u32 {
    match network {
        bitcoin::Network::Bitcoin => 0,
        _ => 1,
    }
}

fn default_indexer(network: bitcoin::Network) -> BitcoinIndexer {
    match network {
        bitcoin::Network::Bitcoin => BitcoinIndexer::BlockchainInfo,
        _ => BitcoinIndexer::Esplora,
    }
}

fn default_esplora_url(network: bitcoin::Network) -> &'static str {
    match network {
        bitcoin::Network::Bitcoin => "https://blockstream.info/api",
        bitcoin::Network::Signet => "https://mempool.space/signet/api",
        bitcoin::Network::Regtest => "http://localhost:3000",
        _ => "https://blockstream.info/testnet/api",
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T, WalletError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| WalletError::Config(format!("{}={:?}: {}", name, raw, e)))
}
