//! Reconciliation API seam.

use async_trait::async_trait;
use backend_client::{ApiResult, BackendClient, UserProfile};

/// The two backend operations the verification run needs.
///
/// `BackendClient` is the production implementation; tests substitute
/// in-memory fakes.
#[async_trait]
pub trait ReconciliationApi: Send + Sync {
    /// Fetch the backend's view of the authenticated user; `None` when the
    /// backend has no record yet.
    async fn fetch_me(&self, token: &str) -> ApiResult<Option<UserProfile>>;

    /// Register a provider wallet for the authenticated subject.
    async fn register_wallet(&self, token: &str, wallet_id: &str) -> ApiResult<UserProfile>;
}

#[async_trait]
impl ReconciliationApi for BackendClient {
    async fn fetch_me(&self, token: &str) -> ApiResult<Option<UserProfile>> {
        BackendClient::fetch_me(self, token).await
    }

    async fn register_wallet(&self, token: &str, wallet_id: &str) -> ApiResult<UserProfile> {
        BackendClient::register_wallet(self, token, wallet_id).await
    }
}
