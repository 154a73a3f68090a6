//! Linear reconnect policy.

use std::time::Duration;

use crate::config::SupervisorConfig;

/// Decides how long to wait before the next attempt and when a transport
/// method has used up its budget.
///
/// Attempt `n` (1-based) waits `interval * n`, capped at `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    interval: Duration,
    max_interval: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(interval: Duration, max_interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_interval,
            max_attempts,
        }
    }

    /// Builds the policy from supervisor configuration.
    #[must_use]
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(
            config.reconnect_interval(),
            config.max_reconnect_interval(),
            config.max_reconnect_attempts,
        )
    }

    /// Delay before retrying after `failures` consecutive failures.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        self.interval
            .checked_mul(failures.max(1))
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }

    /// True once `failures` has reached the budget.
    #[must_use]
    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }

    /// Attempts allowed per transport method.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
