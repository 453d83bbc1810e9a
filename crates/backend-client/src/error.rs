//! Backend API error types.

use thiserror::Error;

/// Errors returned by backend calls.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend rejected the session token (HTTP 401). The consuming
    /// layer must clear the local token and broadcast a token update.
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend rejected a wallet registration.
    #[error("Wallet registration failed: {0}")]
    Registration(String),

    /// Non-success response other than 401/404.
    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ApiError {
    /// Returns true if the error is transient (connection trouble or a
    /// server-side 5xx) and the operation may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using ApiError.
pub type ApiResult<T> = Result<T, ApiError>;
