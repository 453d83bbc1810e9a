//! High-level API over the persisted session-bridge state.

use crate::{StorageKeys, StorageResult, TokenStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chain address cached from the backend profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAddress {
    /// Chain kind tag (evm, solana, movement)
    pub chain: String,
    /// Address string in the chain's canonical form
    pub address: String,
}

/// High-level accessor for the four persisted session keys: the session
/// token, the cached profile snapshot, the cached wallet-address list, and
/// the last-verified timestamp.
///
/// Everything here is a best-effort cache: safe to lose, re-derivable by
/// re-running verification. Decode failures read as absence.
pub struct SessionStore {
    inner: TokenStore,
}

impl SessionStore {
    /// Create a session store over a dual-backed token store.
    pub fn new(inner: TokenStore) -> Self {
        Self { inner }
    }

    // ==========================================
    // Session token
    // ==========================================

    /// Persist the session token.
    pub fn save_token(&self, token: &str) -> StorageResult<()> {
        self.inner.save(token)
    }

    /// Read the current session token.
    pub fn token(&self) -> Option<String> {
        self.inner.get()
    }

    /// Remove the session token. Never errors.
    pub fn clear_token(&self) {
        self.inner.clear();
    }

    // ==========================================
    // Cached profile snapshot
    // ==========================================

    /// Cache the backend profile snapshot.
    pub fn save_profile_snapshot(&self, snapshot: &serde_json::Value) {
        match serde_json::to_string(snapshot) {
            Ok(json) => {
                let _ = self.inner.put(StorageKeys::USER_PROFILE, &json);
            }
            Err(e) => tracing::debug!(error = %e, "failed to encode profile snapshot"),
        }
    }

    /// Read the cached profile snapshot, if any.
    pub fn profile_snapshot(&self) -> Option<serde_json::Value> {
        let raw = self.inner.fetch(StorageKeys::USER_PROFILE)?;
        serde_json::from_str(&raw).ok()
    }

    // ==========================================
    // Cached wallet addresses
    // ==========================================

    /// Cache the wallet-address list.
    pub fn save_wallet_addresses(&self, addresses: &[ChainAddress]) {
        match serde_json::to_string(addresses) {
            Ok(json) => {
                let _ = self.inner.put(StorageKeys::WALLET_ADDRESSES, &json);
            }
            Err(e) => tracing::debug!(error = %e, "failed to encode wallet addresses"),
        }
    }

    /// Read the cached wallet-address list. Empty on absence or decode error.
    pub fn wallet_addresses(&self) -> Vec<ChainAddress> {
        self.inner
            .fetch(StorageKeys::WALLET_ADDRESSES)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    // ==========================================
    // Last-verified bookkeeping
    // ==========================================

    /// Record when the currently stored token was last verified.
    pub fn set_last_verified_at(&self, at: DateTime<Utc>) {
        let _ = self.inner.put(StorageKeys::LAST_VERIFIED_AT, &at.to_rfc3339());
    }

    /// When the currently stored token was last verified, if ever.
    pub fn last_verified_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.inner.fetch(StorageKeys::LAST_VERIFIED_AT)?;
        DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Forget the last-verified marker (a freshly installed token has not
    /// been verified yet).
    pub fn clear_last_verified_at(&self) {
        self.inner.remove(StorageKeys::LAST_VERIFIED_AT);
    }

    // ==========================================
    // Whole-session teardown
    // ==========================================

    /// Remove everything: token, profile snapshot, wallet addresses, and the
    /// last-verified marker. Never errors.
    pub fn clear_session(&self) {
        self.inner.clear();
        self.inner.remove(StorageKeys::USER_PROFILE);
        self.inner.remove(StorageKeys::WALLET_ADDRESSES);
        self.inner.remove(StorageKeys::LAST_VERIFIED_AT);
    }
}
