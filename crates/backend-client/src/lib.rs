//! HTTP client for the Tapdeck backend.
//!
//! Covers the reconciliation endpoints (`/auth/me`, `/auth/verify`), the
//! client side of the two token-exchange endpoints, and the remaining
//! bearer-authenticated app endpoints (referral redeem, claim, account
//! deletion). Every response shape is decoded into an explicit type at the
//! boundary; nothing is trusted as-is.

mod client;
mod error;
mod types;

pub use client::BackendClient;
pub use error::{ApiError, ApiResult};
pub use types::{
    DeletionResponse, ExchangeResponse, ExchangeUser, MessageResponse, ProvisionedWallet,
    UserProfile,
};
