//! Back-off schedule shared by every retry loop in the workspace.

use std::time::Duration;

use rand::Rng;

use crate::AppConfig;

const MAX_DELAY: Duration = Duration::from_secs(30);

/// Retry budget and base delay for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl RetrySettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_base_ms: config.retry_backoff_base_ms,
        }
    }

    /// Delay before retry number `retry` (1-based): `backoff_base_ms * 2^(retry-1)`,
    /// scaled by a random factor in `[0.75, 1.25]` and capped at 30 s.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(10);
        let base = Duration::from_millis(self.backoff_base_ms.saturating_mul(1_u64 << exponent));
        base.min(MAX_DELAY)
            .mul_f64(rand::rng().random_range(0.75..=1.25))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_within_jitter_and_caps() {
        let settings = RetrySettings {
            max_retries: 5,
            backoff_base_ms: 1_000,
        };
        let first = settings.delay_for(1).as_millis();
        let third = settings.delay_for(3).as_millis();
        assert!((750..=1_250).contains(&first), "first: {first}");
        assert!((3_000..=5_000).contains(&third), "third: {third}");
        assert!(settings.delay_for(40) <= MAX_DELAY.mul_f64(1.25));
    }

    #[test]
    fn zero_base_never_sleeps() {
        let settings = RetrySettings {
            max_retries: 3,
            backoff_base_ms: 0,
        };
        assert_eq!(settings.delay_for(2), Duration::ZERO);
    }
}
