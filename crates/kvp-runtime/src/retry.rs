//! Per-operation retry policy: bounded attempts, exponential backoff.

use std::time::Duration;

use kvp_config::RetrySettings;

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least 1 and `multiplier` to at least 1.0.
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            multiplier: if multiplier.is_finite() {
                multiplier.max(1.0)
            } else {
                1.0
            },
        }
    }

    pub fn from_settings(s: &RetrySettings) -> Self {
        Self::new(s.max_attempts, s.initial_backoff, s.max_backoff, s.multiplier)
    }

    /// One attempt, no retry.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 1.0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `attempts` tries.
    pub fn allows_retry_after(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before retry number `retry` (1-based): `initial * multiplier^(retry-1)`,
    /// capped at `max_backoff`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let nanos = self.initial_backoff.as_nanos() as f64 * self.multiplier.powi(exp);
        if !nanos.is_finite() || nanos >= self.max_backoff.as_nanos() as f64 {
            return self.max_backoff;
        }
        Duration::from_nanos(nanos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_settings_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts(), 4);
        assert_eq!(p.delay_for(1), Duration::from_millis(50));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350), 2.0);
        assert_eq!(p.delay_for(1), Duration::from_millis(100));
        assert_eq!(p.delay_for(2), Duration::from_millis(200));
        assert_eq!(p.delay_for(3), Duration::from_millis(350));
        assert_eq!(p.delay_for(40), Duration::from_millis(350));
    }

    #[test]
    fn attempts_are_bounded() {
        let p = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO, 2.0);
        assert!(p.allows_retry_after(1));
        assert!(p.allows_retry_after(2));
        assert!(!p.allows_retry_after(3));
        assert!(!RetryPolicy::no_retry().allows_retry_after(1));
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(
            RetryPolicy::new(0, Duration::ZERO, Duration::ZERO, 0.0).max_attempts(),
            1
        );
    }
}
