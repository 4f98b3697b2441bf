//! Capped exponential backoff.

use crate::config::{BenchmarkConfig, QueueConfig};
use std::time::Duration;

/// `delay(attempt) = min(base_delay * multiplier^attempt, max_delay)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    /// Delay between redeliveries of a failed batch
    pub fn for_queue(config: &QueueConfig) -> Self {
        Self::new(
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// Delay between completion polls of a benchmark grid point
    pub fn for_polling(config: &BenchmarkConfig) -> Self {
        Self::new(
            Duration::from_millis(config.poll_base_delay_ms),
            Duration::from_millis(config.poll_max_delay_ms),
        )
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(64) as i32);
        let delay_secs = self.base_delay.as_secs_f64() * factor;
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay_secs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = BackoffPolicy::new(Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(3), Duration::from_secs(40));
        assert_eq!(policy.delay_for(4), Duration::from_secs(60));
        assert_eq!(policy.delay_for(1000), Duration::from_secs(60));
    }

    #[test]
    fn test_polling_policy_reads_benchmark_config() {
        let policy = BackoffPolicy::for_polling(&BenchmarkConfig::default());
        assert_eq!(policy.base_delay, Duration::from_millis(5000));
        assert_eq!(policy.max_delay, Duration::from_millis(60_000));
    }
}
