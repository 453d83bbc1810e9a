//! Verification error types.

use backend_client::ApiError;
use thiserror::Error;

/// Errors produced by a verification run.
///
/// Every variant resolves to a state transition inside the manager; nothing
/// escapes unhandled. Fatal variants clear the session; see the manager for
/// the one transport-failure exception.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The backend rejected the session token (401). The session has been
    /// cleared and a token update broadcast.
    #[error("Session rejected by backend")]
    Unauthorized,

    /// Registration was required but no wallet id could be resolved or
    /// created within the polling budget. Fatal; session cleared.
    #[error("Wallet could not be resolved in time; registration blocked")]
    RegistrationBlocked,

    /// The backend rejected the wallet registration. Fatal; session cleared.
    #[error("Wallet registration failed: {0}")]
    Registration(String),

    /// Non-creation wallet provider failure. Fatal for this attempt.
    #[error("Wallet provider failure: {0}")]
    Wallet(String),

    /// Transport failure mid-flow. Fatal for this attempt; a token that a
    /// previous run verified is kept.
    #[error("Network failure during verification: {0}")]
    Network(String),

    /// Persisting the session failed on every backing store.
    #[error("Storage failure: {0}")]
    Storage(#[from] bridge_storage::StorageError),

    /// Invalid transition in the verification state machine.
    #[error("Invalid verification state transition: {0}")]
    InvalidStateTransition(String),
}

impl From<ApiError> for VerifyError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Unauthorized => VerifyError::Unauthorized,
            ApiError::Registration(msg) => VerifyError::Registration(msg),
            other => VerifyError::Network(other.to_string()),
        }
    }
}

/// Result type alias using VerifyError.
pub type VerifyResult<T> = Result<T, VerifyError>;
