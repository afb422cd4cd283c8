/// Axum HTTP handlers, one module per mocked API

pub mod blockchain_info;
pub mod blockfrost;
pub mod esplora;
pub mod lnbits;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::MockLedger;

/// Shared application state
pub type AppState = MockLedger;

/// Custom error type for handlers
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, message).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Record "METHOD /path" of every request before serving it
pub async fn record_call(State(ledger): State<AppState>, request: Request, next: Next) -> Response {
    ledger.record_call(format!("{} {}", request.method(), request.uri().path()));
    next.run(request).await
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
