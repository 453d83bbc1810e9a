//! Exchange error types.

use thiserror::Error;

/// Errors surfaced by the identity exchange.
///
/// At an HTTP surface these map to 400/401 equivalents; see
/// [`ExchangeError::http_status`].
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// The provider credential's signature did not verify, or the credential
    /// is malformed.
    #[error("Invalid identity credential: {0}")]
    InvalidCredential(String),

    /// The provider credential is missing its subject or organization claim.
    #[error("Identity credential missing required claims")]
    MissingClaims,

    /// The credential's expiry is in the past.
    #[error("Identity credential expired")]
    Expired,

    /// The message signature did not recover to the given address.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// The exchanger is missing required configuration.
    #[error("Exchange configuration error: {0}")]
    Config(String),

    /// Session-token encoding failed.
    #[error("Token encoding error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ExchangeError {
    /// HTTP status equivalent for serving this error at the exchange surface.
    pub fn http_status(&self) -> u16 {
        match self {
            ExchangeError::InvalidCredential(_)
            | ExchangeError::Expired
            | ExchangeError::InvalidSignature(_) => 401,
            ExchangeError::MissingClaims => 400,
            ExchangeError::Config(_) | ExchangeError::Token(_) => 500,
        }
    }
}

/// Result type alias using ExchangeError.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ExchangeError::MissingClaims.http_status(), 400);
        assert_eq!(ExchangeError::Expired.http_status(), 401);
        assert_eq!(
            ExchangeError::InvalidCredential("bad".to_string()).http_status(),
            401
        );
        assert_eq!(
            ExchangeError::InvalidSignature("bad".to_string()).http_status(),
            401
        );
        assert_eq!(
            ExchangeError::Config("missing key".to_string()).http_status(),
            500
        );
    }
}
