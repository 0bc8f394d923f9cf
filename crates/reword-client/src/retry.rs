use std::time::Duration;

use rand::Rng;

/// Retry policy for retryable transformation failures.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the capped delay added as random jitter (0.25 = up to 25%).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.25,
        }
    }
}

/// Delay before retry number `attempt` (0-based).
///
/// `min(cap, base * 2^attempt)` plus up to `jitter_factor` random jitter,
/// then the max against any server-specified minimum wait so a rate-limit
/// hint is never undercut.
pub fn retry_delay(config: &RetryConfig, attempt: u32, suggested: Option<Duration>) -> Duration {
    let exp = config.base_delay.as_millis() as f64 * 2.0_f64.powi(attempt as i32);
    let capped = exp.min(config.max_delay.as_millis() as f64);

    let jitter = if config.jitter_factor > 0.0 {
        capped * config.jitter_factor * rand::thread_rng().gen::<f64>()
    } else {
        0.0
    };

    let computed = Duration::from_millis((capped + jitter) as u64);
    match suggested {
        Some(hint) => computed.max(hint),
        None => computed,
    }
}
