//! Client configuration.
//!
//! `ClientConfig` is the root document loaded by `ConfigLoader`. Transport
//! sections are owned by `tidings-transport`; the supervisor and credential
//! sections live here.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidings_core::config::{
    Configurable, EnvOverride, Validatable, ValidationContext, Validator,
};
use tidings_core::error::ConfigError;
use tidings_telemetry::logging::LogConfig;
use tidings_telemetry::metrics::MetricsConfig;
use tidings_transport::poll::PollConfig;
use tidings_transport::rest::RestConfig;
use tidings_transport::ws::SocketConfig;

/// Root configuration for a realtime client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST endpoints.
    #[serde(default)]
    pub rest: RestConfig,

    /// Socket transport.
    #[serde(default)]
    pub socket: SocketConfig,

    /// Long-poll transport.
    #[serde(default)]
    pub poll: PollConfig,

    /// Reconnect policy and circuit breaker.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Token sources.
    #[serde(default)]
    pub credentials: CredentialConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LogConfig,

    /// Metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Validatable for ClientConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let mut ctx = ValidationContext::new();
        self.rest.validate_into(&mut ctx);
        self.socket.validate_into(&mut ctx);
        self.poll.validate_into(&mut ctx);
        self.supervisor.validate_into(&mut ctx);
        self.credentials.validate_into(&mut ctx);
        ctx.into_result()
    }
}

impl Configurable for ClientConfig {
    fn apply_env_overrides(&mut self, prefix: &str) {
        self.rest.apply_env_overrides(prefix);
        self.socket.apply_env_overrides(prefix);
        self.poll.apply_env_overrides(prefix);
        self.supervisor.apply_env_overrides(prefix);
        self.credentials.apply_env_overrides(prefix);
        EnvOverride::apply_string(&format!("{prefix}_LOG_LEVEL"), &mut self.logging.level);
        EnvOverride::apply_bool(&format!("{prefix}_METRICS_ENABLED"), &mut self.metrics.enabled);
    }

    fn env_var_names(prefix: &str) -> Vec<String> {
        [
            "REST_BASE_URL",
            "REST_AJAX_URL",
            "REST_TIMEOUT_MS",
            "REST_NONCE_HEADER",
            "REST_DISCOVERY_TTL_MS",
            "SOCKET_URL",
            "SOCKET_ENABLED",
            "SOCKET_CONNECT_TIMEOUT_MS",
            "SOCKET_HANDSHAKE_TIMEOUT_MS",
            "SOCKET_HEARTBEAT_INTERVAL_MS",
            "POLL_INTERVAL_MS",
            "POLL_MAX_INTERVAL_MS",
            "POLL_MAX_CONSECUTIVE_FAILURES",
            "POLL_SESSION_FAILURE_CEILING",
            "SUPERVISOR_MAX_RECONNECT_ATTEMPTS",
            "SUPERVISOR_RECONNECT_INTERVAL_MS",
            "SUPERVISOR_MAX_RECONNECT_INTERVAL_MS",
            "SUPERVISOR_FAILURE_THRESHOLD",
            "SUPERVISOR_POLL_FALLBACK",
            "CREDENTIALS_TOKEN",
            "CREDENTIALS_FALLBACK_TOKEN",
            "CREDENTIALS_TOKEN_ENV",
            "CREDENTIALS_NONCE_ACTION",
            "CREDENTIALS_FRESHNESS_MS",
            "LOG_LEVEL",
            "METRICS_ENABLED",
        ]
        .iter()
        .map(|name| format!("{prefix}_{name}"))
        .collect()
    }
}

/// Reconnect budget, backoff and circuit breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Failed attempts allowed per transport method before moving on.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Base reconnect delay in milliseconds; attempt `n` waits `n` times this.
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Upper bound on the reconnect delay, in milliseconds.
    #[serde(default = "default_max_reconnect_interval_ms")]
    pub max_reconnect_interval_ms: u64,

    /// Consecutive failures that open the circuit even with budget left.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before one trial attempt.
    #[serde(default = "default_circuit_cooldown", with = "humantime_serde")]
    pub circuit_cooldown: Duration,

    /// Fall back to long-polling once the socket budget is spent.
    #[serde(default = "default_poll_fallback")]
    pub poll_fallback: bool,

    /// Capacity of the UI event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_interval_ms() -> u64 {
    5_000
}

fn default_max_reconnect_interval_ms() -> u64 {
    30_000
}

fn default_failure_threshold() -> u32 {
    10
}

fn default_circuit_cooldown() -> Duration {
    Duration::from_secs(300)
}

fn default_poll_fallback() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            max_reconnect_interval_ms: default_max_reconnect_interval_ms(),
            failure_threshold: default_failure_threshold(),
            circuit_cooldown: default_circuit_cooldown(),
            poll_fallback: default_poll_fallback(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SupervisorConfig {
    /// Returns the base reconnect interval.
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Returns the reconnect delay ceiling.
    #[must_use]
    pub fn max_reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_interval_ms)
    }

    /// Sets the reconnect budget.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the base reconnect interval.
    #[must_use]
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sets the circuit cool-down.
    #[must_use]
    pub fn with_circuit_cooldown(mut self, cooldown: Duration) -> Self {
        self.circuit_cooldown = cooldown;
        self
    }

    /// Enables or disables the poll fallback.
    #[must_use]
    pub fn with_poll_fallback(mut self, enabled: bool) -> Self {
        self.poll_fallback = enabled;
        self
    }

    /// Validates this section into `ctx`.
    pub fn validate_into(&self, ctx: &mut ValidationContext) {
        ctx.enter("supervisor");
        Validator::new(ctx)
            .positive("max_reconnect_attempts", &self.max_reconnect_attempts)
            .positive("reconnect_interval_ms", &self.reconnect_interval_ms)
            .at_least(
                "max_reconnect_interval_ms",
                &self.max_reconnect_interval_ms,
                "reconnect_interval_ms",
                &self.reconnect_interval_ms,
            )
            .positive("failure_threshold", &self.failure_threshold)
            .custom(
                "circuit_cooldown",
                !self.circuit_cooldown.is_zero(),
                "Must be greater than zero",
            )
            .positive("event_capacity", &self.event_capacity);
        ctx.exit();
    }

    /// Applies `{prefix}_SUPERVISOR_*` environment overrides.
    pub fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_number(
            &format!("{prefix}_SUPERVISOR_MAX_RECONNECT_ATTEMPTS"),
            &mut self.max_reconnect_attempts,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_SUPERVISOR_RECONNECT_INTERVAL_MS"),
            &mut self.reconnect_interval_ms,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_SUPERVISOR_MAX_RECONNECT_INTERVAL_MS"),
            &mut self.max_reconnect_interval_ms,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_SUPERVISOR_FAILURE_THRESHOLD"),
            &mut self.failure_threshold,
        );
        EnvOverride::apply_bool(
            &format!("{prefix}_SUPERVISOR_POLL_FALLBACK"),
            &mut self.poll_fallback,
        );
    }
}

/// Where tokens come from, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Primary application-issued token.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Secondary token tried when the primary is missing or malformed.
    #[serde(default, skip_serializing)]
    pub fallback_token: Option<String>,

    /// Environment variable read on every refresh.
    #[serde(default)]
    pub token_env: Option<String>,

    /// AJAX action returning a fresh nonce. `None` disables HTTP refresh.
    #[serde(default = "default_nonce_action")]
    pub nonce_action: Option<String>,

    /// How long a fetched token is reused, in milliseconds.
    #[serde(default = "default_freshness_ms")]
    pub freshness_ms: u64,
}

fn default_nonce_action() -> Option<String> {
    Some("tidings_refresh_nonce".to_string())
}

fn default_freshness_ms() -> u64 {
    60_000
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            token: None,
            fallback_token: None,
            token_env: None,
            nonce_action: default_nonce_action(),
            freshness_ms: default_freshness_ms(),
        }
    }
}

impl CredentialConfig {
    /// Returns the token freshness window.
    #[must_use]
    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }

    /// Validates this section into `ctx`.
    pub fn validate_into(&self, ctx: &mut ValidationContext) {
        ctx.enter("credentials");
        Validator::new(ctx).positive("freshness_ms", &self.freshness_ms).custom(
            "token_env",
            self.token_env.as_deref().is_none_or(|name| !name.is_empty()),
            "Must not be empty when set",
        );
        ctx.exit();
    }

    /// Applies `{prefix}_CREDENTIALS_*` environment overrides.
    pub fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_optional_string(&format!("{prefix}_CREDENTIALS_TOKEN"), &mut self.token);
        EnvOverride::apply_optional_string(
            &format!("{prefix}_CREDENTIALS_FALLBACK_TOKEN"),
            &mut self.fallback_token,
        );
        EnvOverride::apply_optional_string(
            &format!("{prefix}_CREDENTIALS_TOKEN_ENV"),
            &mut self.token_env,
        );
        EnvOverride::apply_optional_string(
            &format!("{prefix}_CREDENTIALS_NONCE_ACTION"),
            &mut self.nonce_action,
        );
        EnvOverride::apply_number(
            &format!("{prefix}_CREDENTIALS_FRESHNESS_MS"),
            &mut self.freshness_ms,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidings_core::config::{ConfigFormat, ConfigLoader};

    fn valid_config() -> ClientConfig {
        ClientConfig {
            rest: RestConfig::new(
                "https://example.com/wp-json/tidings/v1",
                "https://example.com/wp-admin/admin-ajax.php",
            ),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_supervisor_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_interval(), Duration::from_secs(5));
        assert_eq!(config.max_reconnect_interval(), Duration::from_secs(30));
        assert_eq!(config.circuit_cooldown, Duration::from_secs(300));
        assert!(config.poll_fallback);
    }

    #[test]
    fn test_credential_defaults() {
        let config = CredentialConfig::default();
        assert_eq!(config.freshness(), Duration::from_secs(60));
        assert_eq!(config.nonce_action.as_deref(), Some("tidings_refresh_nonce"));
        assert!(config.token.is_none());
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_base_url_fails() {
        let err = ClientConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_zero_attempts_fails() {
        let mut config = valid_config();
        config.supervisor.max_reconnect_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_reconnect_attempts"));
    }

    #[test]
    fn test_max_interval_below_base_fails() {
        let mut config = valid_config();
        config.supervisor.max_reconnect_interval_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_with_humantime_cooldown() {
        let yaml = r"
rest:
  base_url: https://example.com/wp-json/tidings/v1
supervisor:
  max_reconnect_attempts: 2
  circuit_cooldown: 90s
  poll_fallback: false
";
        let config: ClientConfig = ConfigLoader::parse(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.supervisor.max_reconnect_attempts, 2);
        assert_eq!(config.supervisor.circuit_cooldown, Duration::from_secs(90));
        assert!(!config.supervisor.poll_fallback);
        assert_eq!(config.poll.interval_ms, 5_000);
    }

    #[test]
    fn test_tokens_are_not_serialized() {
        let mut config = valid_config();
        config.credentials.token = Some("secret-nonce-1".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret-nonce-1"));
    }

    #[test]
    fn test_env_var_names_use_prefix() {
        let names = ClientConfig::env_var_names("TIDINGS");
        assert!(names.contains(&"TIDINGS_SOCKET_URL".to_string()));
        assert!(names.iter().all(|name| name.starts_with("TIDINGS_")));
    }
}
