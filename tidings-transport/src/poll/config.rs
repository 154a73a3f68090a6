//! Poll transport configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidings_core::config::{EnvOverride, ValidationContext, Validator};

/// Configuration for the long-poll transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Delay between polls while healthy, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound for the backoff delay, in milliseconds.
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Consecutive generic poll failures before the transport reports itself
    /// failed to the supervisor.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Consecutive 401/403 session re-creations tolerated before the
    /// transport reports itself failed.
    #[serde(default = "default_session_failure_ceiling")]
    pub session_failure_ceiling: u32,
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_max_interval_ms() -> u64 {
    30_000
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_session_failure_ceiling() -> u32 {
    3
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            session_failure_ceiling: default_session_failure_ceiling(),
        }
    }
}

impl PollConfig {
    /// Returns the base poll interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns the maximum poll interval.
    #[must_use]
    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    /// Validates this section into `ctx`.
    pub fn validate_into(&self, ctx: &mut ValidationContext) {
        ctx.enter("poll");
        Validator::new(ctx)
            .positive("interval_ms", &self.interval_ms)
            .at_least("max_interval_ms", &self.max_interval_ms, "interval_ms", &self.interval_ms)
            .positive("max_consecutive_failures", &self.max_consecutive_failures)
            .positive("session_failure_ceiling", &self.session_failure_ceiling);
        ctx.exit();
    }

    /// Applies `{prefix}_POLL_*` environment overrides.
    pub fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_number(&format!("{prefix}_POLL_INTERVAL_MS"), &mut self.interval_ms);
        EnvOverride::apply_number(
            &format!("{prefix}_POLL_MAX_INTERVAL_MS"),
            &mut self.max_interval_ms,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_POLL_MAX_CONSECUTIVE_FAILURES"),
            &mut self.max_consecutive_failures,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_POLL_SESSION_FAILURE_CEILING"),
            &mut self.session_failure_ceiling,
        );
    }
}
