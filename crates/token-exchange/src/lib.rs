//! Identity exchange for the Tapdeck session bridge.
//!
//! Converts an identity-provider credential into an application session
//! token, in one of two modes:
//!
//! - **Delegated session**: a signed provider JWT carrying subject and
//!   organization claims, verified against the provider's public key.
//! - **Message signature**: an EVM address, a plaintext message, and a
//!   personal-sign signature that must recover to that address.
//!
//! This crate synthesizes tokens only. It persists nothing; storage and
//! broadcast are the caller's responsibility.

mod claims;
mod error;
mod evm;
mod exchanger;

pub use claims::{SessionClaims, SESSION_ISSUER, SESSION_VALIDITY_SECS};
pub use error::{ExchangeError, ExchangeResult};
pub use evm::checksum_address;
pub use exchanger::{IssuedSession, TokenExchanger};
