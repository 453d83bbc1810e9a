//! Core types, configuration, and utilities for the Tapdeck session bridge.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_API_BASE_URL, DEFAULT_JWT_SECRET};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
