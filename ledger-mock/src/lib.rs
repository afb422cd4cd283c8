/// Ledger Mock Server Library
///
/// In-memory stand-ins for the Esplora, blockchain.info, Blockfrost and LNbits
/// APIs, usable as a standalone binary or spawned inside integration tests.

pub mod cbor;
pub mod handlers;
pub mod server;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use server::{create_router, run_server};
pub use state::{MockLedger, StakeAccountState, DEFAULT_API_KEY};
