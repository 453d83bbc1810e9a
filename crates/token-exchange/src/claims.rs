//! Session-token claims.

use serde::{Deserialize, Serialize};

/// Issuer tag carried by every application session token.
pub const SESSION_ISSUER: &str = "tapdeck-api";

/// Session-token validity window: 30 minutes.
pub const SESSION_VALIDITY_SECS: i64 = 30 * 60;

/// Claims of an application session token.
///
/// Delegated-session tokens carry the provider subject and organization;
/// message-signature tokens carry `kind = "evm"` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: `organization:user` for delegated sessions, the checksummed
    /// address for message-signature sessions.
    pub sub: String,
    /// Provider user id (delegated sessions only).
    #[serde(rename = "tkUserId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Provider organization id (delegated sessions only).
    #[serde(rename = "tkOrgId", default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Exchange-mode tag (message-signature sessions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Expiry (seconds since epoch).
    pub exp: i64,
    /// Issuer tag.
    pub iss: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_wire_names() {
        let claims = SessionClaims {
            sub: "org-1:user-1".to_string(),
            user_id: Some("user-1".to_string()),
            org_id: Some("org-1".to_string()),
            kind: None,
            exp: 1_700_000_000,
            iss: SESSION_ISSUER.to_string(),
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["tkUserId"], "user-1");
        assert_eq!(json["tkOrgId"], "org-1");
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_optional_claims_absent_for_message_mode() {
        let claims = SessionClaims {
            sub: "0xAbC".to_string(),
            user_id: None,
            org_id: None,
            kind: Some("evm".to_string()),
            exp: 1_700_000_000,
            iss: SESSION_ISSUER.to_string(),
        };

        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("tkUserId").is_none());
        assert!(json.get("tkOrgId").is_none());
        assert_eq!(json["kind"], "evm");
    }
}
