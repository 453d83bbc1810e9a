//! Backend response types.

use serde::{Deserialize, Serialize};

/// The backend's view of a user.
///
/// Best-effort cache material; staleness is tolerated and it is never a
/// source of truth for authorization decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// EVM chain address, if provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evm_address: Option<String>,
    /// Solana chain address, if provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solana_address: Option<String>,
    /// Movement-compatible chain address, if provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_address: Option<String>,
    /// Referral link for this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_link: Option<String>,
    /// Number of successful referrals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referral_count: Option<u64>,
}

impl UserProfile {
    /// Whether the backend has any chain address registered for this user.
    ///
    /// Drives the wallet-creation decision: an existing address means a
    /// wallet already exists somewhere and a second one must not be created.
    pub fn has_any_address(&self) -> bool {
        self.evm_address.is_some()
            || self.solana_address.is_some()
            || self.movement_address.is_some()
    }
}

/// Envelope for `/auth/me` and `/auth/verify` responses.
#[derive(Debug, Deserialize)]
pub(crate) struct UserEnvelope {
    pub user: UserProfile,
}

/// User summary returned by the exchange endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeUser {
    #[serde(default)]
    pub tk_user_id: Option<String>,
    #[serde(default)]
    pub tk_org_id: Option<String>,
    #[serde(default)]
    pub evm_address: Option<String>,
}

/// A wallet slot reported by the delegated exchange endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionedWallet {
    pub chain: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Response of the two exchange endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeResponse {
    /// The application session token.
    #[serde(rename = "appJwt")]
    pub app_jwt: String,
    pub user: ExchangeUser,
    #[serde(default)]
    pub wallets: Option<Vec<ProvisionedWallet>>,
}

/// Generic message response (`/referral/redeem`, `/claim`).
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Response of `/auth/delete-request`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletionResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}
