//! Credential provider.
//!
//! Hands out the token transports authenticate with. A token is reused for
//! its freshness window; after that, or after [`CredentialProvider::invalidate`],
//! the sources are asked again in priority order and the first candidate
//! passing the shape check wins. A token the server rejected is skipped on
//! the refresh pass so later sources get their turn. When every source comes
//! up empty the last known token is reused. Absence of any token is a plain
//! `None`.

mod sources;

pub use sources::{EnvTokenSource, HttpNonceSource, StaticTokenSource, TokenSource, parse_nonce};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tidings_core::clock::SharedClock;
use tidings_core::types::Token;
use tidings_telemetry::masking::Sensitive;
use tidings_transport::TokenRefresher;
use tidings_transport::rest::RestClient;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CredentialConfig;

#[derive(Debug, Clone)]
struct CachedToken {
    token: Token,
    fetched_at: Instant,
    stale: bool,
}

/// Cached, prioritized token lookup.
pub struct CredentialProvider {
    sources: Vec<Arc<dyn TokenSource>>,
    freshness: Duration,
    clock: SharedClock,
    cache: Mutex<Option<CachedToken>>,
    rejected: Mutex<Option<Token>>,
    refresh: tokio::sync::Mutex<()>,
}

impl CredentialProvider {
    /// Creates a provider with no sources.
    #[must_use]
    pub fn new(freshness: Duration, clock: SharedClock) -> Self {
        Self {
            sources: Vec::new(),
            freshness,
            clock,
            cache: Mutex::new(None),
            rejected: Mutex::new(None),
            refresh: tokio::sync::Mutex::new(()),
        }
    }

    /// Appends a source; earlier sources take priority.
    #[must_use]
    pub fn with_source(mut self, source: impl TokenSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// Builds the provider described by `config`.
    ///
    /// Order: primary token, fallback token, environment variable, HTTP nonce
    /// refresh (only when `rest` is given and an action is configured).
    #[must_use]
    pub fn from_config(
        config: &CredentialConfig,
        rest: Option<Arc<RestClient>>,
        clock: SharedClock,
    ) -> Self {
        let mut provider = Self::new(config.freshness(), clock)
            .with_source(StaticTokenSource::new("primary", config.token.clone()))
            .with_source(StaticTokenSource::new(
                "fallback",
                config.fallback_token.clone(),
            ));
        if let Some(var) = &config.token_env {
            provider = provider.with_source(EnvTokenSource::new(var.clone()));
        }
        if let (Some(rest), Some(action)) = (rest, &config.nonce_action) {
            provider = provider.with_source(HttpNonceSource::new(rest, action.clone()));
        }
        provider
    }

    /// Number of configured sources.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Returns a usable token, refreshing when the cache is stale.
    pub async fn get_token(&self) -> Option<Token> {
        if let Some(token) = self.fresh_cached() {
            return Some(token);
        }

        let _refreshing = self.refresh.lock().await;
        if let Some(token) = self.fresh_cached() {
            return Some(token);
        }

        let rejected = self.rejected.lock().clone();
        for source in &self.sources {
            match source.fetch().await {
                Ok(Some(candidate)) => match Token::new(candidate.as_str()) {
                    Ok(token) if rejected.as_ref() == Some(&token) => {
                        debug!(source = source.name(), "Skipping rejected token");
                    }
                    Ok(token) => {
                        debug!(source = source.name(), "Token obtained");
                        self.store(token.clone());
                        return Some(token);
                    }
                    Err(e) => {
                        warn!(
                            source = source.name(),
                            value = %Sensitive::new(&candidate),
                            error = %e,
                            "Rejected malformed token"
                        );
                    }
                },
                Ok(None) => debug!(source = source.name(), "Token source empty"),
                Err(e) => warn!(source = source.name(), error = %e, "Token source failed"),
            }
        }

        let fallback = self.cache.lock().as_ref().map(|cached| cached.token.clone());
        if fallback.is_some() {
            warn!("Token refresh failed, reusing last known token");
        } else {
            warn!("No token available");
        }
        fallback
    }

    /// Marks the cached token stale and rejected so the next call refreshes
    /// from a source that yields a different token.
    ///
    /// The stale token stays available as the fallback.
    pub fn invalidate(&self) {
        if let Some(cached) = self.cache.lock().as_mut() {
            cached.stale = true;
            *self.rejected.lock() = Some(cached.token.clone());
            debug!("Cached token invalidated");
        }
    }

    /// Stores an externally supplied token as fresh.
    pub fn seed(&self, token: Token) {
        let mut rejected = self.rejected.lock();
        if rejected.as_ref() == Some(&token) {
            *rejected = None;
        }
        drop(rejected);
        self.store(token);
    }

    /// Cached token regardless of freshness.
    #[must_use]
    pub fn cached(&self) -> Option<Token> {
        self.cache.lock().as_ref().map(|cached| cached.token.clone())
    }

    fn store(&self, token: Token) {
        *self.cache.lock() = Some(CachedToken {
            token,
            fetched_at: self.clock.now(),
            stale: false,
        });
    }

    fn fresh_cached(&self) -> Option<Token> {
        let now = self.clock.now();
        let cache = self.cache.lock();
        cache
            .as_ref()
            .filter(|cached| {
                !cached.stale && now.saturating_duration_since(cached.fetched_at) < self.freshness
            })
            .map(|cached| cached.token.clone())
    }
}

#[async_trait]
impl TokenRefresher for CredentialProvider {
    async fn refresh_token(&self) -> Option<Token> {
        self.invalidate();
        self.get_token().await
    }
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("sources", &self.sources.len())
            .field("freshness", &self.freshness)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidings_core::clock::ManualClock;
    use tidings_core::error::CredentialError;

    /// Hands out a scripted sequence of results and counts fetches.
    struct ScriptedSource {
        results: Mutex<Vec<Result<Option<String>, CredentialError>>>,
        fetches: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(results: Vec<Result<Option<String>, CredentialError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into_iter().rev().collect()),
                fetches: Mutex::new(0),
            })
        }

        fn fetches(&self) -> usize {
            *self.fetches.lock()
        }
    }

    #[async_trait]
    impl TokenSource for Arc<ScriptedSource> {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self) -> Result<Option<String>, CredentialError> {
            *self.fetches.lock() += 1;
            self.results.lock().pop().unwrap_or(Ok(None))
        }
    }

    fn provider(clock: &Arc<ManualClock>) -> CredentialProvider {
        CredentialProvider::new(Duration::from_secs(60), clock.clone())
    }

    #[tokio::test]
    async fn test_cached_within_freshness() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(vec![Ok(Some("token-one-1".into()))]);
        let provider = provider(&clock).with_source(source.clone());

        let first = provider.get_token().await.unwrap();
        clock.advance(Duration::from_secs(59));
        let second = provider.get_token().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_refresh_after_freshness_window() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(vec![
            Ok(Some("token-one-1".into())),
            Ok(Some("token-two-2".into())),
        ]);
        let provider = provider(&clock).with_source(source.clone());

        provider.get_token().await.unwrap();
        clock.advance(Duration::from_secs(60));
        let token = provider.get_token().await.unwrap();

        assert_eq!(token.expose(), "token-two-2");
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_priority_and_shape_check() {
        let clock = Arc::new(ManualClock::new());
        let provider = provider(&clock)
            .with_source(StaticTokenSource::new("primary", Some("bad token".into())))
            .with_source(StaticTokenSource::new("empty", None))
            .with_source(StaticTokenSource::new("fallback", Some("fallback-123".into())));

        assert_eq!(provider.get_token().await.unwrap().expose(), "fallback-123");
    }

    #[tokio::test]
    async fn test_invalidate_falls_back_to_stale_token() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(vec![
            Ok(Some("token-one-1".into())),
            Err(CredentialError::SourceFailed {
                source_name: "scripted".into(),
                reason: "offline".into(),
            }),
        ]);
        let provider = provider(&clock).with_source(source.clone());

        provider.get_token().await.unwrap();
        provider.invalidate();
        let token = provider.get_token().await.unwrap();

        assert_eq!(token.expose(), "token-one-1");
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_none_without_sources_or_cache() {
        let clock = Arc::new(ManualClock::new());
        assert!(provider(&clock).get_token().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_token_forces_fetch() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(vec![
            Ok(Some("token-one-1".into())),
            Ok(Some("token-two-2".into())),
        ]);
        let provider = provider(&clock).with_source(source.clone());

        provider.get_token().await.unwrap();
        let refreshed = provider.refresh_token().await.unwrap();
        assert_eq!(refreshed.expose(), "token-two-2");
    }

    #[tokio::test]
    async fn test_seed_is_used_without_fetching() {
        let clock = Arc::new(ManualClock::new());
        let source = ScriptedSource::new(vec![Ok(Some("token-one-1".into()))]);
        let provider = provider(&clock).with_source(source.clone());

        provider.seed(Token::new("seeded-token").unwrap());
        assert_eq!(provider.get_token().await.unwrap().expose(), "seeded-token");
        assert_eq!(source.fetches(), 0);
    }

    #[tokio::test]
    async fn test_refresh_after_rejection_reaches_later_source() {
        let clock = Arc::new(ManualClock::new());
        let nonce = ScriptedSource::new(vec![Ok(Some("fresh-nonce-2".into()))]);
        let provider = provider(&clock)
            .with_source(StaticTokenSource::new("primary", Some("rejected-nonce-1".into())))
            .with_source(nonce.clone());

        assert_eq!(provider.get_token().await.unwrap().expose(), "rejected-nonce-1");
        assert_eq!(nonce.fetches(), 0);

        let refreshed = provider.refresh_token().await.unwrap();
        assert_eq!(refreshed.expose(), "fresh-nonce-2");
        assert_eq!(nonce.fetches(), 1);
    }

    #[tokio::test]
    async fn test_rejected_token_is_last_resort() {
        let clock = Arc::new(ManualClock::new());
        let provider = provider(&clock)
            .with_source(StaticTokenSource::new("primary", Some("rejected-nonce-1".into())));

        provider.get_token().await.unwrap();
        provider.invalidate();
        assert_eq!(provider.get_token().await.unwrap().expose(), "rejected-nonce-1");
    }

    #[test]
    fn test_from_config_source_order() {
        let clock = Arc::new(ManualClock::new());
        let config = CredentialConfig {
            token_env: Some("TIDINGS_TOKEN".into()),
            ..CredentialConfig::default()
        };
        // no REST client, so no HTTP refresh source
        let provider = CredentialProvider::from_config(&config, None, clock);
        assert_eq!(provider.source_count(), 3);
    }
}
