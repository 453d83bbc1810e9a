//! Logging initialization for the session bridge.

use tracing_subscriber::EnvFilter;

/// Initialize the logging system.
///
/// Sets up tracing with a formatted stderr writer and a level filter taken
/// from `RUST_LOG` when set, otherwise the provided default.
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("exchange server started");
/// ```
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
