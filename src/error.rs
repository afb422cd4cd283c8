use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Wallet already exists: {0}")]
    WalletExists(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    Derivation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Bitcoin error: {0}")]
    Bitcoin(String),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("No spendable outputs for {0}")]
    NoUtxos(String),

    #[error("Stake key is not registered: {0}")]
    StakeNotActive(String),

    #[error("No rewards available to withdraw for {0}")]
    NoRewards(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),
}

impl From<reqwest::Error> for WalletError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            WalletError::InvalidResponse(err.to_string())
        } else {
            WalletError::LedgerUnavailable(err.to_string())
        }
    }
}
