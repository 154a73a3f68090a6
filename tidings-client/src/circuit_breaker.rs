//! Circuit breaker guarding connection attempts.
//!
//! # States
//!
//! - **Closed**: attempts pass through
//! - **Open**: attempts are refused until the cool-down elapses
//! - **`HalfOpen`**: exactly one trial attempt is let through
//!
//! The breaker opens when consecutive failures reach the threshold, or when
//! the supervisor trips it after spending its whole reconnect budget. A
//! failed trial reopens it; a successful one closes it and clears the count.
//!
//! ```
//! use std::time::Duration;
//! use tidings_client::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use tidings_core::clock::SystemClock;
//!
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig { failure_threshold: 2, cooldown: Duration::from_secs(300) },
//!     SystemClock::shared(),
//! );
//! breaker.record_failure("socket closed");
//! breaker.record_failure("socket closed");
//! assert!(!breaker.allow_request());
//! ```

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidings_core::clock::SharedClock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation.
    #[default]
    Closed,
    /// Refusing attempts.
    Open,
    /// One trial attempt allowed.
    HalfOpen,
}

impl CircuitState {
    /// Returns true if the circuit is closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns true if the circuit is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true if the circuit is half-open.
    #[must_use]
    pub const fn is_half_open(&self) -> bool {
        matches!(self, Self::HalfOpen)
    }

    /// Returns the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Time to wait before the half-open trial.
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            cooldown: Duration::from_secs(300),
        }
    }
}

/// Point-in-time view of the breaker, included in client status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitSnapshot {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures.
    pub failure_count: u32,
    /// Wall-clock time of the last failure.
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Reason given with the last failure.
    pub last_failure_reason: Option<String>,
    /// Remaining cool-down while open.
    #[serde(with = "humantime_serde")]
    pub retry_in: Option<Duration>,
}

#[derive(Debug, Default)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    last_failure_at: Option<DateTime<Utc>>,
    last_failure_reason: Option<String>,
}

/// Circuit breaker for connection attempts.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: SharedClock,
    state: RwLock<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            state: RwLock::new(BreakerState::default()),
        }
    }

    /// Returns the current state, moving to half-open once the cool-down is over.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.maybe_transition_to_half_open();
        self.state.read().state
    }

    /// Returns true while attempts must not be made.
    ///
    /// Unlike [`allow_request`](Self::allow_request) this does not claim the
    /// half-open trial.
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.maybe_transition_to_half_open();
        let state = self.state.read();
        match state.state {
            CircuitState::Closed => false,
            CircuitState::Open => true,
            CircuitState::HalfOpen => state.trial_in_flight,
        }
    }

    /// Returns true if an attempt may start, claiming the half-open trial.
    #[must_use]
    pub fn allow_request(&self) -> bool {
        self.maybe_transition_to_half_open();

        let mut state = self.state.write();
        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    false
                } else {
                    state.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Records a successful attempt.
    pub fn record_success(&self) {
        let mut state = self.state.write();
        if state.state.is_half_open() {
            info!("Circuit closed after successful trial");
        }
        state.state = CircuitState::Closed;
        state.failure_count = 0;
        state.opened_at = None;
        state.trial_in_flight = false;
        state.last_failure_reason = None;
    }

    /// Records a failed attempt.
    pub fn record_failure(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let now = self.clock.now();
        let mut state = self.state.write();
        state.failure_count = state.failure_count.saturating_add(1);
        state.last_failure_at = Some(self.clock.utc_now());
        state.last_failure_reason = Some(reason);

        match state.state {
            CircuitState::Closed => {
                debug!(
                    failure_count = state.failure_count,
                    threshold = self.config.failure_threshold,
                    reason = ?state.last_failure_reason,
                    "Circuit breaker failure recorded"
                );
                if state.failure_count >= self.config.failure_threshold {
                    warn!(
                        failures = state.failure_count,
                        reason = ?state.last_failure_reason,
                        "Circuit opened"
                    );
                    state.state = CircuitState::Open;
                    state.opened_at = Some(now);
                }
            }
            CircuitState::HalfOpen => {
                warn!(reason = ?state.last_failure_reason, "Circuit reopened after failed trial");
                state.state = CircuitState::Open;
                state.opened_at = Some(now);
                state.trial_in_flight = false;
            }
            CircuitState::Open => {}
        }
    }

    /// Opens the circuit regardless of the failure count.
    pub fn trip(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let mut state = self.state.write();
        if state.state.is_open() {
            return;
        }
        warn!(failures = state.failure_count, reason = %reason, "Circuit tripped");
        state.state = CircuitState::Open;
        state.opened_at = Some(self.clock.now());
        state.trial_in_flight = false;
        state.last_failure_reason = Some(reason);
    }

    /// Releases a claimed half-open trial that will never report back.
    pub fn abandon_trial(&self) {
        let mut state = self.state.write();
        if state.state.is_half_open() && state.trial_in_flight {
            debug!("Half-open trial abandoned");
            state.trial_in_flight = false;
        }
    }

    /// Resets to closed and clears every counter.
    pub fn reset(&self) {
        let mut state = self.state.write();
        info!("Circuit breaker manually reset");
        *state = BreakerState::default();
    }

    /// Returns the current consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.state.read().failure_count
    }

    /// Returns the last failure reason, if any.
    #[must_use]
    pub fn last_failure_reason(&self) -> Option<String> {
        self.state.read().last_failure_reason.clone()
    }

    /// Returns the time remaining until the half-open trial.
    #[must_use]
    pub fn time_until_half_open(&self) -> Option<Duration> {
        let state = self.state.read();
        if state.state != CircuitState::Open {
            return None;
        }
        let now = self.clock.now();
        state.opened_at.map(|opened| {
            self.config
                .cooldown
                .saturating_sub(now.saturating_duration_since(opened))
        })
    }

    /// Returns a snapshot for status reporting.
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.state();
        let retry_in = self.time_until_half_open();
        let inner = self.state.read();
        CircuitSnapshot {
            state,
            failure_count: inner.failure_count,
            last_failure_at: inner.last_failure_at,
            last_failure_reason: inner.last_failure_reason.clone(),
            retry_in,
        }
    }

    fn maybe_transition_to_half_open(&self) {
        let now = self.clock.now();
        let mut state = self.state.write();
        if state.state != CircuitState::Open {
            return;
        }

        if let Some(opened_at) = state.opened_at
            && now.saturating_duration_since(opened_at) >= self.config.cooldown
        {
            info!("Circuit half-open, one trial attempt allowed");
            state.state = CircuitState::HalfOpen;
            state.trial_in_flight = false;
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("failure_count", &self.failure_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tidings_core::clock::ManualClock;

    fn breaker(threshold: u32) -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig {
                failure_threshold: threshold,
                cooldown: Duration::from_secs(300),
            },
            clock.clone(),
        );
        (breaker, clock)
    }

    #[test]
    fn test_starts_closed() {
        let (breaker, _) = breaker(3);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow_request());
        assert!(!breaker.is_blocking());
    }

    #[test]
    fn test_opens_at_threshold() {
        let (breaker, _) = breaker(3);
        breaker.record_failure("a");
        breaker.record_failure("b");
        assert!(breaker.state().is_closed());

        breaker.record_failure("c");
        assert!(breaker.state().is_open());
        assert!(!breaker.allow_request());
        assert_eq!(breaker.last_failure_reason().as_deref(), Some("c"));
    }

    #[test]
    fn test_success_resets_failures() {
        let (breaker, _) = breaker(3);
        breaker.record_failure("a");
        breaker.record_failure("b");
        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);
        breaker.record_failure("c");
        assert!(breaker.state().is_closed());
    }

    #[test]
    fn test_trip_opens_below_threshold() {
        let (breaker, _) = breaker(10);
        breaker.record_failure("socket closed");
        breaker.trip("reconnect budget exhausted");
        assert!(breaker.state().is_open());
        assert_eq!(breaker.failure_count(), 1);
        assert_eq!(
            breaker.last_failure_reason().as_deref(),
            Some("reconnect budget exhausted")
        );
    }

    #[test]
    fn test_single_trial_after_cooldown() {
        let (breaker, clock) = breaker(1);
        breaker.record_failure("down");
        assert!(breaker.is_blocking());

        clock.advance(Duration::from_secs(299));
        assert!(!breaker.allow_request());

        clock.advance(Duration::from_secs(1));
        assert!(breaker.state().is_half_open());
        assert!(!breaker.is_blocking());
        assert!(breaker.allow_request());
        assert!(!breaker.allow_request());
        assert!(breaker.is_blocking());
    }

    #[test]
    fn test_failed_trial_reopens() {
        let (breaker, clock) = breaker(1);
        breaker.record_failure("down");
        clock.advance(Duration::from_secs(300));
        assert!(breaker.allow_request());

        breaker.record_failure("still down");
        assert!(breaker.state().is_open());
        assert_eq!(breaker.time_until_half_open(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_successful_trial_closes() {
        let (breaker, clock) = breaker(1);
        breaker.record_failure("down");
        clock.advance(Duration::from_secs(300));
        assert!(breaker.allow_request());

        breaker.record_success();
        assert!(breaker.state().is_closed());
        assert_eq!(breaker.failure_count(), 0);
    }

    #[test]
    fn test_snapshot_reports_cooldown() {
        let (breaker, clock) = breaker(1);
        breaker.record_failure("down");
        clock.advance(Duration::from_secs(60));

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.retry_in, Some(Duration::from_secs(240)));
        assert!(snapshot.last_failure_at.is_some());
    }

    #[test]
    fn test_reset() {
        let (breaker, _) = breaker(1);
        breaker.record_failure("down");
        breaker.reset();
        assert!(breaker.state().is_closed());
        assert_eq!(breaker.failure_count(), 0);
        assert!(breaker.last_failure_reason().is_none());
    }

    #[test]
    fn test_abandoned_trial_can_be_reclaimed() {
        let (breaker, clock) = breaker(1);
        breaker.record_failure("down");
        clock.advance(Duration::from_secs(300));

        assert!(breaker.allow_request());
        assert!(breaker.is_blocking());
        breaker.abandon_trial();
        assert!(!breaker.is_blocking());
        assert!(breaker.allow_request());
    }
}
