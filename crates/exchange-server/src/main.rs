//! HTTP surface for the token-exchange endpoints.
//!
//! Serves the two exchange modes plus a health probe:
//!
//! - `POST /api/auth/exchange`: delegated-session exchange; the provider
//!   credential arrives as a bearer header or as `{"turnkeyJwt": ...}`.
//! - `POST /api/auth/evm-exchange`: message-signature exchange.
//! - `GET /api/health`

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bridge_config_and_utils::{init_logging, Config, Paths};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use token_exchange::{ExchangeError, IssuedSession, TokenExchanger};

#[derive(Clone)]
struct AppState {
    exchanger: Arc<TokenExchanger>,
}

#[derive(Debug, Default, Deserialize)]
struct DelegatedExchangeBody {
    #[serde(rename = "turnkeyJwt")]
    turnkey_jwt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageExchangeBody {
    address: Option<String>,
    message: Option<String>,
    signature: Option<String>,
}

/// Wallet slot placeholder returned by the delegated exchange while
/// server-side provisioning is pending.
#[derive(Debug, Serialize)]
struct WalletSlot {
    chain: &'static str,
    address: &'static str,
    status: &'static str,
}

fn pending_wallets() -> Vec<WalletSlot> {
    ["evm", "solana", "movement"]
        .into_iter()
        .map(|chain| WalletSlot {
            chain,
            address: "",
            status: "pending",
        })
        .collect()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

async fn delegated_exchange(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<DelegatedExchangeBody>>,
) -> Response {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string);
    let credential = bearer.or_else(|| body.and_then(|Json(body)| body.turnkey_jwt));

    let Some(credential) = credential else {
        return error_response(StatusCode::BAD_REQUEST, "Missing identity credential");
    };

    match state.exchanger.exchange_delegated(&credential) {
        Ok(issued) => {
            let user = json!({
                "tkUserId": issued.claims.user_id,
                "tkOrgId": issued.claims.org_id,
            });
            exchange_response(issued, user, Some(pending_wallets()))
        }
        Err(e) => exchange_error_response(e),
    }
}

async fn message_exchange(
    State(state): State<AppState>,
    body: Option<Json<MessageExchangeBody>>,
) -> Response {
    let Some(Json(body)) = body else {
        return error_response(StatusCode::BAD_REQUEST, "Missing fields");
    };
    let (Some(address), Some(message), Some(signature)) =
        (body.address, body.message, body.signature)
    else {
        return error_response(StatusCode::BAD_REQUEST, "Missing fields");
    };

    match state.exchanger.exchange_message(&address, &message, &signature) {
        Ok(issued) => {
            let user = json!({ "evmAddress": issued.claims.sub });
            exchange_response(issued, user, None)
        }
        Err(e) => exchange_error_response(e),
    }
}

fn exchange_response(
    issued: IssuedSession,
    user: serde_json::Value,
    wallets: Option<Vec<WalletSlot>>,
) -> Response {
    let mut payload = json!({
        "appJwt": issued.token,
        "user": user,
    });
    if let Some(wallets) = wallets {
        payload["wallets"] = json!(wallets);
    }
    Json(payload).into_response()
}

fn exchange_error_response(error: ExchangeError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    tracing::warn!(status = %status, error = %error, "exchange rejected");
    error_response(status, &error.to_string())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/exchange", post(delegated_exchange))
        .route("/api/auth/evm-exchange", post(message_exchange))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;
    init_logging(&config.log_level);

    if config.uses_insecure_secret() {
        tracing::warn!("running with the insecure development signing secret");
    }
    if config.provider_public_key_pem.is_none() {
        tracing::warn!(
            "no provider verification key configured; delegated exchange will be rejected"
        );
    }

    let exchanger = TokenExchanger::new(
        &config.jwt_secret,
        config.provider_public_key_pem.as_deref(),
    )?;
    let app = router(AppState {
        exchanger: Arc::new(exchanger),
    });

    let listener = tokio::net::TcpListener::bind(&config.exchange_bind).await?;
    tracing::info!(addr = %config.exchange_bind, "exchange server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_wallets_cover_all_chains() {
        let wallets = pending_wallets();
        assert_eq!(wallets.len(), 3);
        assert!(wallets.iter().all(|w| w.status == "pending"));
        let chains: Vec<_> = wallets.iter().map(|w| w.chain).collect();
        assert_eq!(chains, vec!["evm", "solana", "movement"]);
    }

    #[test]
    fn test_router_builds() {
        let exchanger = TokenExchanger::new("test-secret", None).unwrap();
        let _ = router(AppState {
            exchanger: Arc::new(exchanger),
        });
    }

    #[test]
    fn test_delegated_body_wire_name() {
        let body: DelegatedExchangeBody =
            serde_json::from_str(r#"{"turnkeyJwt": "abc"}"#).unwrap();
        assert_eq!(body.turnkey_jwt.as_deref(), Some("abc"));
    }
}
