//! Bounded polling primitive.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Bounds for a polling loop: total budget and probe interval.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum total time to keep probing.
    pub timeout: Duration,
    /// Delay between probes.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(200),
        }
    }
}

/// Probe until a value appears or the budget runs out.
///
/// The probe runs once immediately, then at each interval tick until the
/// deadline. Returns a definite result, `Some` on success and `None` on
/// timeout, with no timer left running either way.
pub async fn poll_until<T, F, Fut>(config: &PollConfig, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + config.timeout;

    if let Some(value) = probe().await {
        return Some(value);
    }

    loop {
        if Instant::now() + config.interval > deadline {
            return None;
        }
        tokio::time::sleep(config.interval).await;
        if let Some(value) = probe().await {
            return Some(value);
        }
    }
}
