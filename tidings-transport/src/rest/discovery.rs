//! Socket endpoint discovery.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tidings_core::clock::SharedClock;
use tidings_core::error::Result;
use tidings_core::types::Token;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::client::RestClient;

/// Resolves the socket endpoint URL.
#[async_trait]
pub trait SocketDiscovery: Send + Sync {
    /// Returns the socket URL, or `None` when the server offers no socket
    /// (the client should use the poll transport only).
    async fn socket_url(&self, token: Option<&Token>) -> Option<String>;

    /// Drops any cached result.
    fn invalidate(&self);
}

#[derive(Debug, Clone)]
struct CachedUrl {
    url: Option<String>,
    fetched_at: Instant,
}

/// Discovery through the server's AJAX endpoint.
///
/// Results, including "no socket", are reused for `discovery_ttl` so rapid
/// reconnects do not hammer the endpoint. If the token is rejected the
/// request is retried once without it.
pub struct HttpSocketDiscovery {
    rest: Arc<RestClient>,
    clock: SharedClock,
    ttl: Duration,
    cache: Mutex<Option<CachedUrl>>,
}

impl HttpSocketDiscovery {
    /// Creates a discovery client using the TTL from the REST configuration.
    #[must_use]
    pub fn new(rest: Arc<RestClient>, clock: SharedClock) -> Self {
        let ttl = rest.config().discovery_ttl();
        Self {
            rest,
            clock,
            ttl,
            cache: Mutex::new(None),
        }
    }

    fn cached(&self) -> Option<Option<String>> {
        let cache = self.cache.lock();
        let entry = cache.as_ref()?;
        (self.clock.now().saturating_duration_since(entry.fetched_at) < self.ttl)
            .then(|| entry.url.clone())
    }

    async fn fetch(&self, token: Option<&Token>) -> Result<Value> {
        let action = &self.rest.config().discovery_action;
        let mut request = self.rest.ajax(action);
        if let Some(token) = token {
            request = request.token(token);
        }
        request.send_json().await
    }
}

#[async_trait]
impl SocketDiscovery for HttpSocketDiscovery {
    async fn socket_url(&self, token: Option<&Token>) -> Option<String> {
        if let Some(url) = self.cached() {
            return url;
        }

        let response = match self.fetch(token).await {
            Err(e) if e.is_auth_rejection() && token.is_some() => {
                debug!(error = %e, "Discovery rejected the token, retrying without it");
                self.fetch(None).await
            }
            other => other,
        };

        let url = match response {
            Ok(body) => parse_socket_url(&body),
            Err(e) => {
                warn!(error = %e, "Socket discovery failed");
                None
            }
        };

        debug!(url = ?url, "Socket discovery result");
        *self.cache.lock() = Some(CachedUrl {
            url: url.clone(),
            fetched_at: self.clock.now(),
        });
        url
    }

    fn invalidate(&self) {
        *self.cache.lock() = None;
    }
}

/// Extracts a socket URL from `{url}` or `{success: true, data: {url}}`.
///
/// Anything else, including `{success: false}` or a non-`ws(s)` URL, yields
/// `None`.
#[must_use]
pub fn parse_socket_url(body: &Value) -> Option<String> {
    let url = match body.get("success").and_then(Value::as_bool) {
        Some(false) => None,
        Some(true) => body.pointer("/data/url").or_else(|| body.get("url")),
        None => body.get("url"),
    }?;

    url.as_str()
        .filter(|url| url.starts_with("ws://") || url.starts_with("wss://"))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::RestConfig;
    use serde_json::json;
    use tidings_core::clock::{Clock, ManualClock};

    #[test]
    fn test_parse_flat_and_wrapped() {
        assert_eq!(
            parse_socket_url(&json!({"url": "wss://rt.example.com/socket"})).as_deref(),
            Some("wss://rt.example.com/socket")
        );
        assert_eq!(
            parse_socket_url(&json!({"success": true, "data": {"url": "ws://localhost:9000"}}))
                .as_deref(),
            Some("ws://localhost:9000")
        );
    }

    #[test]
    fn test_parse_rejects_missing_or_failed() {
        assert_eq!(parse_socket_url(&json!({"success": false})), None);
        assert_eq!(parse_socket_url(&json!({"success": true, "data": {}})), None);
        assert_eq!(parse_socket_url(&json!({"url": "https://not-a-socket"})), None);
        assert_eq!(parse_socket_url(&json!([])), None);
    }

    #[tokio::test]
    async fn test_cache_respects_ttl() {
        let rest = Arc::new(
            RestClient::new(RestConfig::new(
                "https://example.com/wp-json/tidings/v1",
                "https://example.com/wp-admin/admin-ajax.php",
            ))
            .unwrap(),
        );
        let clock = Arc::new(ManualClock::new());
        let discovery = HttpSocketDiscovery::new(rest, clock.clone());

        *discovery.cache.lock() = Some(CachedUrl {
            url: Some("wss://cached.example.com".to_string()),
            fetched_at: clock.now(),
        });
        assert_eq!(
            discovery.cached(),
            Some(Some("wss://cached.example.com".to_string()))
        );

        clock.advance(Duration::from_secs(31));
        assert_eq!(discovery.cached(), None);

        discovery.invalidate();
        assert!(discovery.cache.lock().is_none());
    }
}
