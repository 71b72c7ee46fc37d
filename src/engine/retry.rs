//! Retry policies for storefront fetches and webhook delivery.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff for transient fetch failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total fetch attempts per scan, including the first (minimum 1).
    pub max_attempts: u32,
    /// Delay before the first retry (before jitter).
    pub base_delay: Duration,
    /// Maximum delay cap (before jitter).
    pub max_delay: Duration,
    /// Jitter fraction: the capped delay is stretched by a random factor in
    /// `[1, 1 + jitter]`. Set to 0.0 for deterministic delays. Values above
    /// 1.0 act as 1.0; non-finite values disable jitter.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the failed attempt `attempt` (1-indexed).
    ///
    /// `base * 2^(attempt - 1)`, capped at `max_delay`, then jittered.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let capped_ms = base_ms.saturating_mul(1u64 << exponent).min(max_ms);

        // NaN and infinity would make the sample range invalid.
        if !self.jitter.is_finite() || self.jitter <= 0.0 {
            return Duration::from_millis(capped_ms);
        }
        let stretch: f64 = rand::rng().random_range(0.0..=self.jitter.min(1.0));
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let jittered = (capped_ms as f64 * (1.0 + stretch)) as u64;
        Duration::from_millis(jittered)
    }

    /// Returns `true` if another attempt may follow attempt `attempt`
    /// (1-indexed).
    #[must_use]
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

/// Fixed-spacing retries for webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait between attempts.
    pub spacing: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            spacing: Duration::from_secs(5),
        }
    }
}

impl DeliveryPolicy {
    /// Total attempts per registration, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(2));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(DeliveryPolicy::default().max_attempts(), 3);
    }

    #[test]
    fn exponential_backoff() {
        let policy = no_jitter();
        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(4), Duration::from_secs(16));
    }

    #[test]
    fn delay_capped_at_max() {
        let policy = no_jitter();
        assert_eq!(policy.delay_after(5), Duration::from_secs(30));
        assert_eq!(policy.delay_after(40), Duration::from_secs(30));
    }

    #[test]
    fn jitter_only_stretches() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay_after(1);
            assert!(delay >= Duration::from_secs(2), "{delay:?} too low");
            assert!(delay <= Duration::from_millis(2_500), "{delay:?} too high");
        }
    }

    #[test]
    fn non_finite_jitter_is_ignored() {
        for jitter in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let policy = RetryPolicy {
                jitter,
                ..RetryPolicy::default()
            };
            assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        }
    }

    #[test]
    fn oversized_jitter_at_most_doubles() {
        let policy = RetryPolicy {
            jitter: 50.0,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            assert!(policy.delay_after(1) <= Duration::from_secs(4));
        }
    }

    #[test]
    fn attempt_budget() {
        let policy = no_jitter();
        assert!(policy.allows_another(1));
        assert!(policy.allows_another(2));
        assert!(!policy.allows_another(3));

        let single = RetryPolicy {
            max_attempts: 0,
            ..no_jitter()
        };
        assert!(!single.allows_another(1));
    }
}
