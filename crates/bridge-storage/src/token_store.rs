//! Dual-backed token store.

use crate::{StorageBackend, StorageError, StorageKeys, StorageResult};

/// Dual-backed persistence for the session token and related cache keys.
///
/// Policy, stated once: writes go to the durable backing first and the fast
/// cache second, each best-effort and independent: a failure writing to one
/// must not abort the other. Reads prefer the durable backing and fall back
/// to the cache when the durable backing is unavailable or empty. Removal is
/// attempted on both backings and never errors. A reader must tolerate one
/// backing lagging momentarily behind the other.
pub struct TokenStore {
    durable: Box<dyn StorageBackend>,
    cache: Box<dyn StorageBackend>,
}

impl TokenStore {
    /// Create a store over the given durable and cache backings.
    pub fn new(durable: Box<dyn StorageBackend>, cache: Box<dyn StorageBackend>) -> Self {
        Self { durable, cache }
    }

    /// Persist the session token to both backings.
    ///
    /// Succeeds when at least one backing accepted the write.
    pub fn save(&self, token: &str) -> StorageResult<()> {
        self.put(StorageKeys::SESSION_TOKEN, token)
    }

    /// Read the session token, preferring the durable backing.
    pub fn get(&self) -> Option<String> {
        self.fetch(StorageKeys::SESSION_TOKEN)
    }

    /// Remove the session token from both backings. Never errors.
    pub fn clear(&self) {
        self.remove(StorageKeys::SESSION_TOKEN);
    }

    /// Best-effort dual write for an arbitrary key.
    pub fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let durable_result = self.durable.set(key, value);
        if let Err(e) = &durable_result {
            tracing::warn!(key, error = %e, "durable store write failed");
        }

        let cache_result = self.cache.set(key, value);
        if let Err(e) = &cache_result {
            tracing::warn!(key, error = %e, "cache store write failed");
        }

        match (durable_result, cache_result) {
            (Err(d), Err(c)) => Err(StorageError::AllBackendsFailed(format!("{d}; {c}"))),
            _ => Ok(()),
        }
    }

    /// Read an arbitrary key, preferring the durable backing.
    pub fn fetch(&self, key: &str) -> Option<String> {
        match self.durable.get(key) {
            Ok(Some(value)) => return Some(value),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(key, error = %e, "durable store read failed, trying cache");
            }
        }
        self.cache.get(key).ok().flatten()
    }

    /// Remove an arbitrary key from both backings. Never errors.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.durable.delete(key) {
            tracing::debug!(key, error = %e, "durable store delete failed");
        }
        if let Err(e) = self.cache.delete(key) {
            tracing::debug!(key, error = %e, "cache store delete failed");
        }
    }
}
