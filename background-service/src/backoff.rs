use std::time::Duration;

/// Exponential backoff with jitter for fetch-cycle failures.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 2000,
            max_delay_ms: 300_000, // cap at 5 minutes
            backoff_multiplier: 2.0,
            jitter_factor: 0.2, // 20% jitter to prevent thundering herd
        }
    }
}

impl BackoffPolicy {
    /// Delay before retrying after `attempt` consecutive failures
    /// (attempt counts from 1).
    pub fn delay(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay_ms = ((self.base_delay_ms as f64 * multiplier) as u64).min(self.max_delay_ms);

        let jitter_range = (delay_ms as f64 * self.jitter_factor) as u64;
        let jitter = fastrand::u64(0..=jitter_range);

        Duration::from_millis((delay_ms + jitter).min(self.max_delay_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_with_attempts() {
        let policy = BackoffPolicy {
            jitter_factor: 0.0,
            ..BackoffPolicy::default()
        };

        assert_eq!(policy.delay(1), Duration::from_millis(2000));
        assert_eq!(policy.delay(2), Duration::from_millis(4000));
        assert_eq!(policy.delay(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy {
            jitter_factor: 0.0,
            ..BackoffPolicy::default()
        };

        assert_eq!(policy.delay(30), Duration::from_millis(300_000));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = BackoffPolicy::default();

        for attempt in 1..5 {
            let base = Duration::from_millis(2000 * 2u64.pow(attempt - 1));
            let delay = policy.delay(attempt);
            assert!(delay >= base);
            assert!(delay <= base.mul_f64(1.0 + policy.jitter_factor));
        }
    }
}
