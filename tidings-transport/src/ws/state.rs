//! Socket connection state.

#![allow(clippy::redundant_pub_crate)]

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Lifecycle of a single socket connection.
///
/// `Idle -> Connecting -> Open -> Authenticating -> Ready -> Closing -> Closed`,
/// with any state able to drop to `Closed` on error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocketState {
    /// Never connected.
    Idle,
    /// Opening the TCP/TLS connection.
    Connecting,
    /// Socket open, nothing sent yet.
    Open,
    /// `authenticate` sent, waiting for `authenticated`.
    Authenticating,
    /// Handshake complete; subscribe and publish go straight out.
    Ready,
    /// Intentional shutdown in progress.
    Closing,
    /// Connection gone.
    Closed,
}

impl SocketState {
    /// Returns true once the handshake has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true while a connect attempt is underway.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open | Self::Authenticating)
    }

    /// Returns the state as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal bookkeeping for the socket transport.
#[derive(Debug)]
pub(crate) struct InternalState {
    pub state: SocketState,
    pub last_ready: Option<Instant>,
    pub last_message: Option<Instant>,
    pub last_ping: Option<Instant>,
    pub last_pong: Option<Instant>,
    pub awaiting_pong: bool,
}

impl Default for InternalState {
    fn default() -> Self {
        Self {
            state: SocketState::Idle,
            last_ready: None,
            last_message: None,
            last_ping: None,
            last_pong: None,
            awaiting_pong: false,
        }
    }
}

impl InternalState {
    pub fn mark_ready(&mut self, now: Instant) {
        self.state = SocketState::Ready;
        self.last_ready = Some(now);
        self.awaiting_pong = false;
    }

    pub fn mark_closed(&mut self) {
        self.state = SocketState::Closed;
        self.awaiting_pong = false;
    }

    pub fn record_message(&mut self, now: Instant) {
        self.last_message = Some(now);
    }

    pub fn record_ping(&mut self, now: Instant) {
        self.last_ping = Some(now);
        self.awaiting_pong = true;
    }

    pub fn record_pong(&mut self, now: Instant) {
        self.last_pong = Some(now);
        self.awaiting_pong = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(SocketState::Ready.is_ready());
        assert!(!SocketState::Authenticating.is_ready());
        assert!(SocketState::Authenticating.is_transitioning());
        assert!(!SocketState::Closed.is_transitioning());
        assert_eq!(SocketState::Closing.to_string(), "closing");
    }

    #[test]
    fn test_ping_pong_tracking() {
        let mut state = InternalState::default();
        let now = Instant::now();
        state.mark_ready(now);
        state.record_ping(now);
        assert!(state.awaiting_pong);
        state.record_pong(now);
        assert!(!state.awaiting_pong);
        state.mark_closed();
        assert_eq!(state.state, SocketState::Closed);
    }
}
