//! Retry policy for sink deliveries.
//!
//! Sinks classify errors; the runtime owns the policy. A batch whose
//! delivery fails with a retryable error is re-sent unchanged after an
//! exponentially growing, jittered delay, up to the attempt limit.

use std::time::Duration;

use rand::Rng;

/// Bounded exponential backoff with jitter.
///
/// Defaults follow the agent contract: 200 ms base delay, doubling per
/// attempt, ±20% jitter, at most 5 attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    /// Fractional jitter applied symmetrically, e.g. `0.2` for ±20%.
    pub jitter: f64,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// The delay before retry number `attempt` (1 = the first retry,
    /// following the first failed delivery).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let spread = if self.jitter > 0.0 {
            rand::rng().random_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        Duration::from_secs_f64(base * (1.0 + spread))
    }

    /// True while another attempt is allowed after `attempt` failures.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_within_jitter_bounds() {
        let policy = RetryPolicy::default();

        for attempt in 1..=4 {
            let expected = 0.2 * 2f64.powi(attempt as i32 - 1);
            let delay = policy.backoff(attempt).as_secs_f64();
            assert!(
                delay >= expected * 0.8 && delay <= expected * 1.2,
                "attempt {attempt}: delay {delay}s outside [{};{}]",
                expected * 0.8,
                expected * 1.2
            );
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(4));
        assert!(!policy.allows_retry(5));
    }
}
