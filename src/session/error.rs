use thiserror::Error;

use super::token_store::TokenStoreError;
use super::transport::{ApiResponse, TransportError};

/// Failures surfaced by the session client and the listing/upload calls built
/// on it. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad credentials (or a disabled account) at login
    #[error("{0}")]
    AuthenticationFailure(String),

    /// 401 on an authenticated call. The session has already been torn down.
    #[error("Unauthorized")]
    SessionExpired,

    /// Non-2xx with the server's `error` message
    #[error("{message}")]
    ValidationFailure { status: u16, message: String },

    /// Transport-level failure (connect, timeout, reset)
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] TokenStoreError),
}

impl ApiError {
    /// Build a `ValidationFailure` from a non-2xx response, using the
    /// `{ "error": ... }` payload when present.
    pub fn from_response(response: &ApiResponse, fallback: &str) -> Self {
        ApiError::ValidationFailure {
            status: response.status,
            message: response
                .error_message()
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network(err.0)
    }
}
