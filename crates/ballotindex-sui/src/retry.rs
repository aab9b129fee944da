//! Exponential backoff for transient RPC failures within one query.
//!
//! This only smooths over blips on a single request. A query that still
//! fails is reported to the tracker loop, which keeps its cursor and tries
//! again on the next tick.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retry attempts after the first try.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    /// Cap on exponential growth.
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

/// Stateless policy: the delay depends only on the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        })
    }

    /// Delay before the `attempt`-th retry (1-based), or `None` once
    /// `max_retries` is exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi((attempt - 1) as i32);
        let capped = base_ms.min(self.config.max_backoff.as_millis() as f64);
        Some(Duration::from_millis(capped as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_then_stop() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        });
        assert_eq!(policy.next_delay(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.next_delay(3), Some(Duration::from_millis(400)));
        assert_eq!(policy.next_delay(4), None);
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
            multiplier: 10.0,
        });
        assert_eq!(policy.next_delay(5), Some(Duration::from_millis(500)));
    }

    #[test]
    fn none_never_retries() {
        assert_eq!(RetryPolicy::none().next_delay(1), None);
    }
}
