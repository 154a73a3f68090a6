//! Local poll backoff.

use std::time::Duration;

/// Exponential backoff between polls.
///
/// After `k` consecutive failures the next delay is `min(base * 2^k, max)`.
/// A single success returns it to `base`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl PollBackoff {
    /// Creates a backoff with no recorded failures.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    /// Delay before the next poll.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        let factor = 2u32.checked_pow(self.failures).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }

    /// Records a failed poll.
    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }

    /// Records a successful poll.
    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures so far.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_capped() {
        let mut backoff = PollBackoff::new(Duration::from_secs(5), Duration::from_secs(30));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));

        let expected = [10, 20, 30, 30];
        for secs in expected {
            backoff.record_failure();
            assert_eq!(backoff.next_delay(), Duration::from_secs(secs));
        }
    }

    #[test]
    fn test_success_resets_to_base() {
        let mut backoff = PollBackoff::new(Duration::from_secs(5), Duration::from_secs(30));
        backoff.record_failure();
        backoff.record_failure();
        backoff.record_success();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_large_failure_count_does_not_overflow() {
        let mut backoff = PollBackoff::new(Duration::from_secs(5), Duration::from_secs(30));
        for _ in 0..100 {
            backoff.record_failure();
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(30));
    }
}
