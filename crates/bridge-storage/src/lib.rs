//! Storage abstraction for the Tapdeck session bridge.
//!
//! This crate provides the dual-backed token store: a durable file-backed
//! key/value store (the native-preferences analog) paired with a fast
//! in-memory cache. Writes go to both backings, each best-effort and
//! independent; reads prefer the durable backing and fall back to the cache.

mod file;
mod keys;
mod memory;
mod session_store;
mod token_store;
mod traits;

pub use file::FileStore;
pub use keys::StorageKeys;
pub use memory::MemoryStore;
pub use session_store::{ChainAddress, SessionStore};
pub use token_store::TokenStore;
pub use traits::StorageBackend;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backing-store specific error
    #[error("Backing store error: {0}")]
    Backend(String),

    /// Both backing stores rejected a write
    #[error("All backing stores failed: {0}")]
    AllBackendsFailed(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
