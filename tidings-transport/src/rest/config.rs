//! REST client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tidings_core::config::{EnvOverride, ValidationContext, Validator};

/// Configuration for the realtime REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// REST base, e.g. `https://example.com/wp-json/tidings/v1`.
    #[serde(default)]
    pub base_url: String,

    /// AJAX endpoint used for socket discovery and nonce refresh.
    #[serde(default)]
    pub ajax_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Header carrying the token on every request.
    #[serde(default = "default_nonce_header")]
    pub nonce_header: String,

    /// AJAX action returning the socket URL.
    #[serde(default = "default_discovery_action")]
    pub discovery_action: String,

    /// How long a discovery result is reused, in milliseconds.
    #[serde(default = "default_discovery_ttl_ms")]
    pub discovery_ttl_ms: u64,

    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_nonce_header() -> String {
    "X-WP-Nonce".to_string()
}

fn default_discovery_action() -> String {
    "tidings_get_websocket_config".to_string()
}

fn default_discovery_ttl_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    format!("tidings/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            ajax_url: String::new(),
            timeout_ms: default_timeout_ms(),
            nonce_header: default_nonce_header(),
            discovery_action: default_discovery_action(),
            discovery_ttl_ms: default_discovery_ttl_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl RestConfig {
    /// Creates a configuration for the given REST base and AJAX endpoint.
    #[must_use]
    pub fn new(base_url: impl Into<String>, ajax_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ajax_url: ajax_url.into(),
            ..Self::default()
        }
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the discovery cache TTL.
    #[must_use]
    pub fn discovery_ttl(&self) -> Duration {
        Duration::from_millis(self.discovery_ttl_ms)
    }

    /// Validates this section into `ctx`.
    pub fn validate_into(&self, ctx: &mut ValidationContext) {
        ctx.enter("rest");
        Validator::new(ctx)
            .require_non_empty("base_url", &self.base_url)
            .url_with_scheme("base_url", &self.base_url, &["http", "https"])
            .url_with_scheme("ajax_url", &self.ajax_url, &["http", "https"])
            .require_non_empty("nonce_header", &self.nonce_header)
            .positive("timeout_ms", &self.timeout_ms);
        ctx.exit();
    }

    /// Applies `{prefix}_REST_*` environment overrides.
    pub fn apply_env_overrides(&mut self, prefix: &str) {
        EnvOverride::apply_string(&format!("{prefix}_REST_BASE_URL"), &mut self.base_url);
        EnvOverride::apply_string(&format!("{prefix}_REST_AJAX_URL"), &mut self.ajax_url);
        EnvOverride::apply_number(&format!("{prefix}_REST_TIMEOUT_MS"), &mut self.timeout_ms);
        EnvOverride::apply_string(&format!("{prefix}_REST_NONCE_HEADER"), &mut self.nonce_header);
        EnvOverride::apply_number(
            &format!("{prefix}_REST_DISCOVERY_TTL_MS"),
            &mut self.discovery_ttl_ms,
        );
    }
}
