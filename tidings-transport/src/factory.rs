//! Default transport construction.

use async_trait::async_trait;
use std::sync::Arc;
use tidings_core::clock::{SharedClock, SystemClock};
use tidings_core::error::{Result, TransportError};
use tidings_core::types::{Token, TransportMethod};

use crate::poll::{HttpPollApi, PollConfig, PollTransport};
use crate::rest::{HttpSocketDiscovery, RestClient, SocketDiscovery};
use crate::transport::{TokenRefresher, Transport, TransportFactory};
use crate::ws::{SocketConfig, SocketTransport};

/// Builds [`SocketTransport`] and `PollTransport<HttpPollApi>` instances.
///
/// A configured socket URL wins; otherwise the URL comes from discovery. No
/// URL means the socket method is unavailable and the supervisor goes
/// straight to polling.
pub struct HttpTransportFactory {
    rest: Arc<RestClient>,
    socket: SocketConfig,
    poll: PollConfig,
    discovery: Arc<dyn SocketDiscovery>,
    clock: SharedClock,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl HttpTransportFactory {
    /// Creates a factory using HTTP discovery and the system clock.
    #[must_use]
    pub fn new(rest: Arc<RestClient>, socket: SocketConfig, poll: PollConfig) -> Self {
        let clock = SystemClock::shared();
        let discovery = Arc::new(HttpSocketDiscovery::new(Arc::clone(&rest), clock.clone()));
        Self {
            rest,
            socket,
            poll,
            discovery,
            clock,
            refresher: None,
        }
    }

    /// Replaces the discovery implementation.
    #[must_use]
    pub fn with_discovery(mut self, discovery: Arc<dyn SocketDiscovery>) -> Self {
        self.discovery = discovery;
        self
    }

    /// Replaces the clock handed to new transports.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the token refresher handed to poll transports.
    #[must_use]
    pub fn with_token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    async fn socket_url(&self, token: &Token) -> Option<String> {
        if self.socket.url.is_empty() {
            self.discovery.socket_url(Some(token)).await
        } else {
            Some(self.socket.url.clone())
        }
    }
}

#[async_trait]
impl TransportFactory for HttpTransportFactory {
    async fn create(&self, method: TransportMethod, token: &Token) -> Result<Arc<dyn Transport>> {
        match method {
            TransportMethod::Socket => {
                let unavailable = |reason: &str| TransportError::Unavailable {
                    method: method.to_string(),
                    reason: reason.to_string(),
                };
                if !self.socket.enabled {
                    return Err(unavailable("disabled by configuration").into());
                }
                let url = self
                    .socket_url(token)
                    .await
                    .ok_or_else(|| unavailable("server offers no socket endpoint"))?;
                let socket =
                    SocketTransport::new(self.socket.with_url(url)).with_clock(self.clock.clone());
                Ok(Arc::new(socket))
            }
            TransportMethod::Poll => {
                let mut poll = PollTransport::new(
                    HttpPollApi::new(Arc::clone(&self.rest)),
                    self.poll.clone(),
                )
                .with_clock(self.clock.clone());
                if let Some(refresher) = &self.refresher {
                    poll = poll.with_token_refresher(Arc::clone(refresher));
                }
                Ok(Arc::new(poll))
            }
        }
    }
}
