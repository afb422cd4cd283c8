/// Ledger Mock Server
///
/// Serves in-memory Esplora, blockchain.info, Blockfrost and LNbits APIs for
/// local development against the wallet core.

use anyhow::{Context, Result};
use ledger_mock::{run_server, MockLedger};
use std::env;

#[derive(Debug)]
struct Config {
    network: bitcoin::Network,
    api_key: Option<String>,
    server_host: String,
    server_port: u16,
}

impl Config {
    fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let network = match env::var("BTC_NETWORK")
            .unwrap_or_else(|_| "testnet".to_string())
            .as_str()
        {
            "mainnet" | "bitcoin" => bitcoin::Network::Bitcoin,
            "signet" => bitcoin::Network::Signet,
            "regtest" => bitcoin::Network::Regtest,
            _ => bitcoin::Network::Testnet,
        };

        let api_key = env::var("LN_API_KEY").ok();

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("Invalid SERVER_PORT")?;

        Ok(Self {
            network,
            api_key,
            server_host,
            server_port,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting ledger mock server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    log::info!("Bitcoin network: {:?}", config.network);

    let ledger = MockLedger::new(config.network);
    if let Some(api_key) = config.api_key {
        ledger.state().api_key = api_key;
    }

    run_server(ledger, config.server_host, config.server_port)
        .await
        .context("Server error")?;

    Ok(())
}
