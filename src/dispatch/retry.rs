//! Retry policy and backoff for transport failures

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Delay shape between retry attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Retry immediately
    None,
    /// Same delay before every retry
    Fixed { delay: Duration },
    /// `initial * multiplier^(n-1)`, capped at `max`, with ±`jitter` spread
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
        /// Fraction of the delay (0.0-1.0) used as random spread
        jitter: f64,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl BackoffStrategy {
    /// Delay before the retry that follows failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { delay } => *delay,
            Self::Exponential {
                initial,
                max,
                multiplier,
                jitter,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let base = initial.as_millis() as f64 * multiplier.max(1.0).powi(exponent);
                let capped = base.min(max.as_millis() as f64);
                let spread = capped * jitter.clamp(0.0, 1.0);
                let jittered = if spread > 0.0 {
                    capped + rand::thread_rng().gen_range(-spread..=spread)
                } else {
                    capped
                };
                Duration::from_millis(jittered.max(0.0) as u64)
            }
        }
    }
}

/// Retry policy for retryable transport failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay shape between attempts
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Create the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::None,
        }
    }

    /// Set the maximum attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the backoff strategy
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attempts actually allowed; zero is treated as one
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay after failed attempt `attempt`, honouring a provider hint
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let computed = self.backoff.delay_for(attempt);
        match retry_after {
            Some(hint) => computed.max(hint),
            None => computed,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff() {
        let backoff = BackoffStrategy::Fixed {
            delay: Duration::from_millis(250),
        };
        assert_eq!(backoff.delay_for(1), Duration::from_millis(250));
        assert_eq!(backoff.delay_for(5), Duration::from_millis(250));
        assert_eq!(BackoffStrategy::None.delay_for(3), Duration::ZERO);
    }

    #[test]
    fn test_exponential_backoff_without_jitter() {
        let backoff = BackoffStrategy::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(1000),
            multiplier: 2.0,
            jitter: 0.0,
        };
        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for(10), Duration::from_millis(1000));
    }

    #[test]
    fn test_exponential_backoff_jitter_bounds() {
        let backoff = BackoffStrategy::Exponential {
            initial: Duration::from_millis(1000),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.1,
        };
        for _ in 0..100 {
            let delay = backoff.delay_for(1);
            assert!(delay >= Duration::from_millis(899), "{:?}", delay);
            assert!(delay <= Duration::from_millis(1101), "{:?}", delay);
        }
    }

    #[test]
    fn test_retry_policy_attempts_and_hint() {
        let policy = RetryPolicy::new()
            .with_max_attempts(0)
            .with_backoff(BackoffStrategy::Fixed {
                delay: Duration::from_millis(10),
            });
        assert_eq!(policy.attempts(), 1);
        assert_eq!(policy.delay_for(1, None), Duration::from_millis(10));
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(RetryPolicy::no_retry().attempts(), 1);
    }
}
