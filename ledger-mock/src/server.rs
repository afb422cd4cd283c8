/// Axum HTTP server setup and routing
///
/// Each API lives under its own prefix: /esplora, /blockchain, /blockfrost, /lnbits.

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{self, blockchain_info, blockfrost, esplora, lnbits, AppState};
use crate::state::MockLedger;

fn esplora_routes() -> Router<AppState> {
    Router::new()
        .route("/blocks/tip/height", get(esplora::get_tip_height))
        .route("/tx", post(esplora::broadcast_transaction))
        .route("/tx/:txid/hex", get(esplora::get_transaction_hex))
        .route("/address/:address", get(esplora::get_address))
        .route("/address/:address/utxo", get(esplora::get_address_utxos))
}

fn blockchain_info_routes() -> Router<AppState> {
    Router::new()
        .route("/unspent", get(blockchain_info::get_unspent))
        .route("/q/addressbalance/:address", get(blockchain_info::get_address_balance))
        .route("/q/getblockcount", get(blockchain_info::get_block_count))
        .route("/rawtx/:txid", get(blockchain_info::get_raw_transaction))
        .route("/pushtx", post(blockchain_info::push_transaction))
}

fn blockfrost_routes() -> Router<AppState> {
    Router::new()
        .route("/addresses/:address", get(blockfrost::get_address))
        .route("/addresses/:address/utxos", get(blockfrost::get_address_utxos))
        .route("/epochs/latest", get(blockfrost::get_epoch))
        .route("/epochs/latest/parameters", get(blockfrost::get_parameters))
        .route("/blocks/latest", get(blockfrost::get_latest_block))
        .route("/accounts/:stake_address", get(blockfrost::get_account))
        .route("/tx/submit", post(blockfrost::submit_transaction))
}

fn lnbits_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/balance", get(lnbits::get_balance))
        .route(
            "/api/v1/payments",
            get(lnbits::get_payments).post(lnbits::post_payment),
        )
        .route("/api/v1/payments/decode", get(lnbits::decode_invoice))
        .route("/api/v1/payments/:payment_hash", get(lnbits::get_payment_status))
        .route(
            "/api/v1/channels",
            get(lnbits::get_channels).post(lnbits::open_channel),
        )
        .route("/api/v1/channels/:channel_id", delete(lnbits::close_channel))
}

pub fn create_router(ledger: MockLedger) -> Router {
    // Configure CORS to allow requests from local tools
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Mocked APIs
        .nest("/esplora", esplora_routes())
        .nest("/blockchain", blockchain_info_routes())
        .nest("/blockfrost", blockfrost_routes())
        .nest("/lnbits", lnbits_routes())

        // Middleware
        .layer(middleware::from_fn_with_state(
            ledger.clone(),
            handlers::record_call,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())

        // Shared state
        .with_state(ledger)
}

/// Serve on `host:port` until the process stops
pub async fn run_server(ledger: MockLedger, host: String, port: u16) -> anyhow::Result<()> {
    let app = create_router(ledger);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("Ledger mock listening on http://{}", addr);
    log::info!("Esplora: /esplora, blockchain.info: /blockchain");
    log::info!("Blockfrost: /blockfrost, LNbits: /lnbits");

    axum::serve(listener, app).await?;

    Ok(())
}

impl MockLedger {
    /// Serve on an ephemeral localhost port in the background, returning its address
    pub async fn spawn(&self) -> anyhow::Result<SocketAddr> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = create_router(self.clone());

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("Ledger mock stopped: {}", e);
            }
        });

        log::debug!("Ledger mock spawned on {}", addr);
        Ok(addr)
    }
}
