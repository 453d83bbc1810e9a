//! Configuration management for the session bridge.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default backend API base URL (can be overridden at compile time via TAPDECK_API_BASE_URL).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("TAPDECK_API_BASE_URL") {
    Some(url) => url,
    None => "https://api.tapdeck.cards",
};

/// Insecure development fallback for the session-token signing secret.
///
/// Shipping with this value is a deployment error; `Config::load` logs a
/// warning whenever it is in effect.
pub const DEFAULT_JWT_SECRET: &str = "dev-secret";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default bind address for the exchange server.
pub const DEFAULT_EXCHANGE_BIND: &str = "127.0.0.1:4000";

/// Main bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Backend API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Bind address for the exchange server.
    #[serde(default = "default_exchange_bind")]
    pub exchange_bind: String,
    /// Session-token signing secret. Environment-only, never written to disk.
    #[serde(skip, default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// PEM-encoded public verification key of the identity provider.
    /// Environment-only; delegated-session exchange is unavailable without it.
    #[serde(skip)]
    pub provider_public_key_pem: Option<String>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_exchange_bind() -> String {
    DEFAULT_EXCHANGE_BIND.to_string()
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            exchange_bind: default_exchange_bind(),
            jwt_secret: default_jwt_secret(),
            provider_public_key_pem: None,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    ///
    /// Secrets (`jwt_secret`, `provider_public_key_pem`) never come from the
    /// file; they are environment-only.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        if config.uses_insecure_secret() {
            tracing::warn!(
                "TAPDECK_JWT_SECRET is not set; using the insecure development signing secret"
            );
        }

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Override fields from environment variables.
    pub fn load_from_env(&mut self) {
        if let Ok(level) = std::env::var("TAPDECK_LOG_LEVEL") {
            if !level.is_empty() {
                self.log_level = level;
            }
        }
        if let Ok(bind) = std::env::var("TAPDECK_EXCHANGE_BIND") {
            if !bind.is_empty() {
                self.exchange_bind = bind;
            }
        }
        if let Ok(secret) = std::env::var("TAPDECK_JWT_SECRET") {
            if !secret.is_empty() {
                self.jwt_secret = secret;
            }
        }
        if let Ok(pem) = std::env::var("TAPDECK_PROVIDER_PUBKEY_PEM") {
            if !pem.is_empty() {
                self.provider_public_key_pem = Some(pem);
            }
        }
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> CoreResult<()> {
        Url::parse(&self.api_base_url)?;
        Ok(())
    }

    /// True when the signing secret is the insecure development fallback.
    pub fn uses_insecure_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}
