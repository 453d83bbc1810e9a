//! Storage key constants.

/// Storage keys used by the session bridge.
///
/// All persisted values are best-effort caches, safe to lose and
/// re-derivable by re-running verification.
pub struct StorageKeys;

impl StorageKeys {
    /// Application session token
    pub const SESSION_TOKEN: &'static str = "session_token";

    /// Cached backend user profile snapshot (JSON)
    pub const USER_PROFILE: &'static str = "user_profile";

    /// Cached wallet address list (JSON array)
    pub const WALLET_ADDRESSES: &'static str = "wallet_addresses";

    /// Timestamp of the last successful verification of the stored token
    pub const LAST_VERIFIED_AT: &'static str = "last_verified_at";
}
