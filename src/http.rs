//! Response handling shared by the indexer and node clients

use crate::error::WalletError;

/// Turn a non-2xx response into `LedgerUnavailable`, keeping the upstream body verbatim
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, WalletError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(WalletError::LedgerUnavailable(format!(
        "{} failed ({}): {}",
        what, status, body
    )))
}
