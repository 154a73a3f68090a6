//! Socket transport configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidings_core::config::{EnvOverride, ValidationContext, Validator};

/// Configuration for the socket transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketConfig {
    /// Socket endpoint. When empty the URL is taken from discovery.
    #[serde(default)]
    pub url: String,

    /// Whether the socket transport is tried at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Time allowed to open the TCP/TLS connection, in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Time allowed between sending `authenticate` and receiving
    /// `authenticated`, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// Interval between application-level pings, in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_handshake_timeout_ms() -> u64 {
    5_000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            enabled: default_enabled(),
            connect_timeout_ms: default_connect_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
        }
    }
}

impl SocketConfig {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> SocketConfigBuilder {
        SocketConfigBuilder::default()
    }

    /// Returns the connect timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the handshake timeout.
    #[must_use]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Returns the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Returns a copy pointing at `url`.
    #[must_use]
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }

    /// Validates this section into `ctx`.
    pub fn validate_into(&self, ctx: &mut ValidationContext) {
        ctx.enter("socket");
        Validator::new(ctx)
            .url_with_scheme("url", &self.url, &["ws", "wss"])
            .positive("connect_timeout_ms", &self.connect_timeout_ms)
            .positive("handshake_timeout_ms", &self.handshake_timeout_ms)
            .positive("heartbeat_interval_ms", &self.heartbeat_interval_ms);
        ctx.exit();
    }

    /// Applies `{prefix}_SOCKET_*` environment overrides.
    pub fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_string(&format!("{prefix}_SOCKET_URL"), &mut self.url);
        EnvOverride::apply_bool(&format!("{prefix}_SOCKET_ENABLED"), &mut self.enabled);
        EnvOverride::apply_number(
            &format!("{prefix}_SOCKET_CONNECT_TIMEOUT_MS"),
            &mut self.connect_timeout_ms,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_SOCKET_HANDSHAKE_TIMEOUT_MS"),
            &mut self.handshake_timeout_ms,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_SOCKET_HEARTBEAT_INTERVAL_MS"),
            &mut self.heartbeat_interval_ms,
        );
    }
}

/// Builder for [`SocketConfig`].
#[derive(Debug, Default)]
pub struct SocketConfigBuilder {
    url: Option<String>,
    enabled: Option<bool>,
    connect_timeout_ms: Option<u64>,
    handshake_timeout_ms: Option<u64>,
    heartbeat_interval_ms: Option<u64>,
}

impl SocketConfigBuilder {
    /// Sets the endpoint URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Enables or disables the socket transport.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval_ms = Some(duration_ms(interval));
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SocketConfig {
        let defaults = SocketConfig::default();
        SocketConfig {
            url: self.url.unwrap_or(defaults.url),
            enabled: self.enabled.unwrap_or(defaults.enabled),
            connect_timeout_ms: self.connect_timeout_ms.unwrap_or(defaults.connect_timeout_ms),
            handshake_timeout_ms: self
                .handshake_timeout_ms
                .unwrap_or(defaults.handshake_timeout_ms),
            heartbeat_interval_ms: self
                .heartbeat_interval_ms
                .unwrap_or(defaults.heartbeat_interval_ms),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SocketConfig::default();
        assert!(config.enabled);
        assert!(config.url.is_empty());
        assert_eq!(config.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_builder() {
        let config = SocketConfig::builder()
            .url("wss://rt.example.com/socket")
            .handshake_timeout(Duration::from_millis(250))
            .build();
        assert_eq!(config.url, "wss://rt.example.com/socket");
        assert_eq!(config.handshake_timeout_ms, 250);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_validation_rejects_http_url() {
        let config = SocketConfig::builder().url("https://rt.example.com").build();
        let mut ctx = ValidationContext::new();
        config.validate_into(&mut ctx);
        assert!(!ctx.is_valid());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SocketConfig =
            serde_json::from_str(r#"{"url": "ws://localhost:9000", "heartbeat_interval_ms": 1000}"#)
                .unwrap();
        assert_eq!(config.heartbeat_interval_ms, 1000);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }
}
