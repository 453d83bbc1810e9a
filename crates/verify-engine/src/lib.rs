//! Verification state machine for the Tapdeck session bridge.
//!
//! This crate reconciles four asynchronous sources of truth (the identity
//! provider's auth state, the locally cached session token, the backend user
//! record, and provider wallet existence) into one consistent "is this user
//! ready" decision, with deduplication of concurrent attempts, bounded wallet
//! polling, and fatal-vs-non-fatal failure classification.

mod api;
mod error;
mod fsm;
mod poll;
mod verifier;
mod wallet;

pub use api::ReconciliationApi;
pub use error::{VerifyError, VerifyResult};
pub use fsm::{verify_machine, VerifyMachine, VerifyMachineInput, VerifyMachineState, VerifyPhase};
pub use poll::{poll_until, PollConfig};
pub use verifier::{PhaseChange, PhaseCallback, VerificationManager, VerifyOutcome};
pub use wallet::{ChainFamily, CreateWalletRequest, WalletError, WalletProvider, WalletSummary};
