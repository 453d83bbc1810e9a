//! Backend REST client.

use crate::error::{ApiError, ApiResult};
use crate::types::{
    DeletionResponse, ExchangeResponse, MessageResponse, UserEnvelope, UserProfile,
};
use serde_json::json;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Summarize a response body for logging without reproducing its content.
fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Client for the Tapdeck backend API.
#[derive(Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new client for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http_client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch the backend's view of the authenticated user.
    ///
    /// Returns `Ok(None)` when the backend has no record for this subject
    /// yet (the caller may register a wallet). Transport and server errors
    /// are surfaced as errors, never conflated with absence.
    pub async fn fetch_me(&self, token: &str) -> ApiResult<Option<UserProfile>> {
        let url = self.url("/auth/me");
        tracing::debug!(url = %url, "fetching backend user");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if status.as_u16() == 404 {
            tracing::debug!("no backend user yet");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::warn!(status = %status, body_summary = %body_summary, "fetch_me failed");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body_summary,
            });
        }

        let envelope: UserEnvelope = response.json().await?;
        Ok(Some(envelope.user))
    }

    /// Register a provider wallet for the authenticated subject.
    pub async fn register_wallet(&self, token: &str, wallet_id: &str) -> ApiResult<UserProfile> {
        let url = self.url("/auth/verify");
        tracing::debug!(url = %url, "registering wallet with backend");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "walletId": wallet_id }))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::warn!(status = %status, body_summary = %body_summary, "wallet registration rejected");
            return Err(ApiError::Registration(format!(
                "HTTP {} ({})",
                status, body_summary
            )));
        }

        let envelope: UserEnvelope = response.json().await?;
        tracing::info!("wallet registered with backend");
        Ok(envelope.user)
    }

    /// Delegated-session exchange: trade a provider credential for an
    /// application session token.
    pub async fn exchange_session(&self, credential: &str) -> ApiResult<ExchangeResponse> {
        let url = self.url("/api/auth/exchange");
        tracing::debug!(url = %url, "exchanging provider credential");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(credential)
            .json(&json!({}))
            .send()
            .await?;

        self.decode_exchange(response).await
    }

    /// Message-signature exchange: trade a signed message for an application
    /// session token.
    pub async fn exchange_message(
        &self,
        address: &str,
        message: &str,
        signature: &str,
    ) -> ApiResult<ExchangeResponse> {
        let url = self.url("/api/auth/evm-exchange");
        tracing::debug!(url = %url, "exchanging message signature");

        let response = self
            .http_client
            .post(&url)
            .json(&json!({
                "address": address,
                "message": message,
                "signature": signature,
            }))
            .send()
            .await?;

        self.decode_exchange(response).await
    }

    async fn decode_exchange(&self, response: reqwest::Response) -> ApiResult<ExchangeResponse> {
        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::warn!(status = %status, body_summary = %body_summary, "exchange rejected");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body_summary,
            });
        }
        Ok(response.json().await?)
    }

    /// Redeem a referral code. The token is optional; included when a
    /// session exists.
    pub async fn redeem_referral(
        &self,
        code: &str,
        token: Option<&str>,
    ) -> ApiResult<MessageResponse> {
        let url = self.url("/referral/redeem");
        tracing::debug!(url = %url, "redeeming referral code");

        let mut request = self.http_client.post(&url).json(&json!({ "code": code }));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        self.decode_message(response).await
    }

    /// Claim a card using an authorization code from a tap or scan.
    pub async fn claim(&self, token: &str, authorization: &str) -> ApiResult<MessageResponse> {
        let url = self.url("/claim");
        tracing::debug!(url = %url, "claiming card");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "authorization": authorization }))
            .send()
            .await?;

        self.decode_message(response).await
    }

    async fn decode_message(&self, response: reqwest::Response) -> ApiResult<MessageResponse> {
        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::warn!(status = %status, body_summary = %body_summary, "request rejected");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body_summary,
            });
        }
        Ok(response.json().await?)
    }

    /// Request deletion of the authenticated account. The backend confirms
    /// key export is complete before the deletion proceeds.
    pub async fn request_account_deletion(&self, token: &str) -> ApiResult<DeletionResponse> {
        let url = self.url("/auth/delete-request");
        tracing::debug!(url = %url, "requesting account deletion");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            tracing::warn!(status = %status, body_summary = %body_summary, "deletion request rejected");
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: body_summary,
            });
        }

        Ok(response.json().await?)
    }
}
