//! Connection supervisor.
//!
//! [`RealtimeClient`] owns the channel set, the failure counter and the
//! circuit breaker. It picks a transport (socket first, poll after the socket
//! budget is spent), replays the channel set on every successful connect,
//! pumps transport events into the router and decides when to retry and when
//! to give up.
//!
//! Transports never reconnect on their own. Each attempt gets a fresh
//! transport from the [`TransportFactory`]; a failed transport is torn down
//! and replaced.

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tidings_core::clock::{SharedClock, SystemClock};
use tidings_core::config::Validatable;
use tidings_core::error::{ConfigError, Result, TidingsError, TransportError};
use tidings_core::types::{Channel, Token, TransportMethod};
use tidings_telemetry::metrics::TidingsMetrics;
use tidings_telemetry::spans::{connect_span, transport_span};
use tidings_transport::factory::HttpTransportFactory;
use tidings_transport::rest::RestClient;
use tidings_transport::{Transport, TransportEvent, TransportFactory};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use crate::channels::ChannelSet;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};
use crate::config::{ClientConfig, SupervisorConfig};
use crate::credential::CredentialProvider;
use crate::events::{EventBus, UiEvent};
use crate::reconnect::ReconnectPolicy;
use crate::router::{MessageRouter, RoutingTable};

const BUDGET_EXHAUSTED: &str = "reconnect budget exhausted";
const NO_CREDENTIAL: &str = "no credential available";

/// Snapshot returned by [`RealtimeClient::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientStatus {
    /// A transport is ready.
    pub connected: bool,
    /// Method of the ready transport.
    pub method: Option<TransportMethod>,
    /// Channel set in insertion order.
    pub channels: Vec<Channel>,
    /// Consecutive connection failures.
    pub failure_count: u32,
    /// Circuit breaker view.
    pub circuit: CircuitSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    Connected,
}

/// What to do after a failed attempt.
enum Next {
    RetryNow,
    RetryAfter(Duration),
    GiveUp,
}

struct SupervisorState {
    phase: Phase,
    channels: ChannelSet,
    active: Option<Arc<dyn Transport>>,
    /// Transport whose `connect()` is in flight; publishes queue on it.
    connecting: Option<Arc<dyn Transport>>,
    method: TransportMethod,
    attempts: u32,
    /// Bumped by `connect()`, `disconnect()` and `reset()`; stale tasks compare against it.
    generation: u64,
    /// Bumped per installed transport.
    epoch: u64,
    reconnect: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl Default for SupervisorState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            channels: ChannelSet::new(),
            active: None,
            connecting: None,
            method: TransportMethod::Socket,
            attempts: 0,
            generation: 0,
            epoch: 0,
            reconnect: None,
            pump: None,
        }
    }
}

struct Inner {
    config: SupervisorConfig,
    policy: ReconnectPolicy,
    factory: Arc<dyn TransportFactory>,
    credentials: Arc<CredentialProvider>,
    router: MessageRouter,
    bus: EventBus,
    breaker: CircuitBreaker,
    state: parking_lot::Mutex<SupervisorState>,
}

/// Transport-agnostic realtime client.
///
/// ```ignore
/// let client = RealtimeClient::from_config(&config)?;
/// let mut events = client.events();
/// client.subscribe(Channel::comments_post(7)).await?;
/// if client.connect(None).await {
///     while let Ok(event) = events.recv().await {
///         println!("{}", event.to_json());
///     }
/// }
/// ```
pub struct RealtimeClient {
    inner: Arc<Inner>,
}

impl RealtimeClient {
    /// Starts building a client.
    #[must_use]
    pub fn builder(config: SupervisorConfig) -> RealtimeClientBuilder {
        RealtimeClientBuilder::new(config)
    }

    /// Builds a client wired to the HTTP and socket endpoints in `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let clock = SystemClock::shared();
        let rest = Arc::new(RestClient::new(config.rest.clone())?);
        let credentials = Arc::new(CredentialProvider::from_config(
            &config.credentials,
            Some(Arc::clone(&rest)),
            clock.clone(),
        ));
        let factory = HttpTransportFactory::new(rest, config.socket.clone(), config.poll.clone())
            .with_clock(clock.clone())
            .with_token_refresher(credentials.clone());

        Ok(Self::builder(config.supervisor.clone())
            .factory(Arc::new(factory))
            .credentials(credentials)
            .clock(clock)
            .build()?)
    }

    /// Connects, or returns true if already connected.
    ///
    /// Returns false without touching the network while the circuit is open,
    /// while another connect is in progress, or when no token is available.
    /// A failed first attempt schedules retries in the background and also
    /// returns false; `realtime_enabled` announces a later success.
    pub async fn connect(&self, token: Option<Token>) -> bool {
        let span = connect_span(
            self.inner.state.lock().channels.len(),
            self.inner.breaker.state().as_str(),
        );
        self.inner.connect(token).instrument(span).await
    }

    /// Tears down the active transport and pending retries.
    ///
    /// The channel set is kept for the next `connect()`.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await;
    }

    /// Disconnects, clears the channel set and resets the circuit breaker.
    pub async fn reset(&self) {
        self.inner.disconnect().await;
        self.inner.state.lock().channels.clear();
        self.inner.breaker.reset();
        info!("Realtime client reset");
    }

    /// Adds a channel, subscribing it on the active transport if any.
    ///
    /// On transport failure the channel is removed again and the error is
    /// returned.
    pub async fn subscribe(&self, channel: Channel) -> Result<()> {
        let transport = {
            let mut state = self.inner.state.lock();
            if !state.channels.insert(channel.clone()) {
                return Ok(());
            }
            state.active.clone()
        };

        if let Some(transport) = transport
            && let Err(e) = transport.subscribe(&channel).await
        {
            warn!(channel = %channel, error = %e, "Subscribe failed, channel dropped");
            self.inner.state.lock().channels.remove(&channel);
            return Err(e);
        }
        debug!(channel = %channel, "Channel added");
        Ok(())
    }

    /// Removes a channel, unsubscribing it on the active transport if any.
    pub async fn unsubscribe(&self, channel: &Channel) -> Result<()> {
        let transport = {
            let mut state = self.inner.state.lock();
            if !state.channels.remove(channel) {
                return Ok(());
            }
            state.active.clone()
        };

        if let Some(transport) = transport {
            transport.unsubscribe(channel).await?;
        }
        debug!(channel = %channel, "Channel removed");
        Ok(())
    }

    /// Publishes through the active transport.
    ///
    /// While a transport is still connecting the publish is handed to it and
    /// held until it is ready. Fails with `NotConnected` when no transport
    /// exists, including the wait between reconnect attempts.
    pub async fn publish(&self, channel: &Channel, data: Value, kind: Option<&str>) -> Result<()> {
        let transport = {
            let state = self.inner.state.lock();
            state.active.clone().or_else(|| state.connecting.clone())
        };
        match transport {
            Some(transport) => transport.publish(channel, data, kind).await,
            None => Err(TransportError::NotConnected.into()),
        }
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        let (connected, method, channels) = {
            let state = self.inner.state.lock();
            (
                state.phase == Phase::Connected,
                state.active.as_ref().map(|transport| transport.method()),
                state.channels.snapshot(),
            )
        };
        let circuit = self.inner.breaker.snapshot();
        ClientStatus {
            connected,
            method,
            channels,
            failure_count: circuit.failure_count,
            circuit,
        }
    }

    /// Subscribes to UI events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<UiEvent> {
        self.inner.bus.subscribe()
    }

    /// Router for registering message handlers.
    #[must_use]
    pub fn router(&self) -> &MessageRouter {
        &self.inner.router
    }

    /// Credential provider in use.
    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialProvider> {
        &self.inner.credentials
    }

    /// Supervisor configuration in use.
    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for RealtimeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClient")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Inner {
    async fn connect(self: &Arc<Self>, token: Option<Token>) -> bool {
        let generation = {
            let mut state = self.state.lock();
            match state.phase {
                Phase::Connected => return true,
                Phase::Connecting => {
                    debug!("Connect already in progress");
                    return false;
                }
                Phase::Idle => {}
            }
            if self.breaker.is_blocking() {
                info!(
                    retry_in = ?self.breaker.time_until_half_open(),
                    "Circuit open, not connecting"
                );
                return false;
            }
            state.phase = Phase::Connecting;
            state.generation += 1;
            state.method = TransportMethod::Socket;
            state.attempts = 0;
            state.generation
        };

        let token = match token {
            Some(token) => {
                self.credentials.seed(token.clone());
                Some(token)
            }
            None => self.credentials.get_token().await,
        };
        let Some(token) = token else {
            self.give_up(generation, NO_CREDENTIAL);
            return false;
        };

        if !self.breaker.allow_request() {
            self.settle_idle(generation);
            return false;
        }

        self.run_attempts(generation, token).await
    }

    /// Runs attempts until one succeeds, a retry is scheduled or the client
    /// gives up. Returns true on success.
    async fn run_attempts(self: &Arc<Self>, generation: u64, token: Token) -> bool {
        loop {
            let (method, attempt) = {
                let state = self.state.lock();
                if state.generation != generation {
                    return false;
                }
                (state.method, state.attempts + 1)
            };

            let result = self
                .attempt(generation, method, &token)
                .instrument(transport_span(method.as_str(), attempt))
                .await;
            let Err(error) = result else {
                return true;
            };

            match self.on_failure(generation, method, &error) {
                Next::RetryNow => {}
                Next::RetryAfter(delay) => {
                    self.schedule(generation, delay);
                    return false;
                }
                Next::GiveUp => return false,
            }
        }
    }

    async fn attempt(
        self: &Arc<Self>,
        generation: u64,
        method: TransportMethod,
        token: &Token,
    ) -> Result<()> {
        TidingsMetrics::connect_attempt(method.as_str());
        let transport = self.factory.create(method, token).await?;
        let snapshot = {
            let mut state = self.state.lock();
            if state.generation == generation {
                state.connecting = Some(Arc::clone(&transport));
            }
            state.channels.snapshot()
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connected = transport.connect(token, &snapshot, events_tx).await;

        let installed = {
            let mut state = self.state.lock();
            if state
                .connecting
                .as_ref()
                .is_some_and(|connecting| Arc::ptr_eq(connecting, &transport))
            {
                state.connecting = None;
            }
            if connected.is_err() {
                None
            } else if state.generation == generation {
                state.phase = Phase::Connected;
                state.active = Some(Arc::clone(&transport));
                state.attempts = 0;
                state.epoch += 1;
                let added = state.channels.missing_from(&snapshot);
                let removed: Vec<Channel> = snapshot
                    .iter()
                    .filter(|channel| !state.channels.contains(channel))
                    .cloned()
                    .collect();
                Some((state.epoch, added, removed))
            } else {
                None
            }
        };
        connected?;
        let Some((epoch, added, removed)) = installed else {
            debug!(method = %method, "Attempt superseded, discarding transport");
            transport.disconnect().await;
            return Err(TransportError::Closed.into());
        };

        let pump = tokio::spawn(pump(
            Arc::downgrade(self),
            events_rx,
            generation,
            epoch,
            method,
        ));
        {
            let mut state = self.state.lock();
            if state.generation == generation && state.epoch == epoch {
                state.pump = Some(pump);
            } else {
                pump.abort();
            }
        }

        // channels changed while the attempt was in flight
        for channel in &added {
            if let Err(e) = transport.subscribe(channel).await {
                warn!(channel = %channel, error = %e, "Late subscribe failed");
            }
        }
        for channel in &removed {
            if let Err(e) = transport.unsubscribe(channel).await {
                warn!(channel = %channel, error = %e, "Late unsubscribe failed");
            }
        }

        self.breaker.record_success();
        TidingsMetrics::set_connected(method.as_str(), true);
        info!(method = %method, channels = snapshot.len(), "Realtime connected");
        self.bus.emit(UiEvent::RealtimeEnabled { method });
        Ok(())
    }

    /// Applies the reconnect policy to a failed attempt or a failed session.
    fn on_failure(&self, generation: u64, method: TransportMethod, error: &TidingsError) -> Next {
        let mut state = self.state.lock();
        if state.generation != generation {
            return Next::GiveUp;
        }

        if matches!(
            error,
            TidingsError::Transport(TransportError::Unavailable { .. })
        ) {
            if method == TransportMethod::Socket && self.config.poll_fallback {
                info!(reason = %error, "Socket unavailable, using poll");
                state.method = TransportMethod::Poll;
                state.attempts = 0;
                return Next::RetryNow;
            }
            drop(state);
            self.breaker.trip(error.to_string());
            self.give_up(generation, &error.to_string());
            return Next::GiveUp;
        }

        if error.is_auth_rejection() {
            self.credentials.invalidate();
        }
        TidingsMetrics::transport_failed(method.as_str());
        self.breaker.record_failure(error.to_string());
        state.attempts += 1;
        let attempts = state.attempts;

        if self.breaker.state().is_open() {
            drop(state);
            self.give_up(generation, &error.to_string());
            return Next::GiveUp;
        }

        if !self.policy.is_exhausted(attempts) {
            let delay = self.policy.delay(attempts);
            TidingsMetrics::reconnect_scheduled(method.as_str());
            warn!(
                method = %method,
                attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Connection failed, retrying"
            );
            return Next::RetryAfter(delay);
        }

        if method == TransportMethod::Socket && self.config.poll_fallback {
            warn!(attempts, error = %error, "Socket budget spent, falling back to poll");
            state.method = TransportMethod::Poll;
            state.attempts = 0;
            return Next::RetryNow;
        }

        drop(state);
        self.breaker.trip(BUDGET_EXHAUSTED);
        self.give_up(generation, BUDGET_EXHAUSTED);
        Next::GiveUp
    }

    /// Returns to idle and announces that realtime is off.
    fn give_up(&self, generation: u64, reason: &str) {
        if !self.settle_idle(generation) {
            return;
        }
        if self.breaker.state().is_open() {
            TidingsMetrics::circuit_opened();
        }
        let failure_count = self.breaker.failure_count();
        warn!(reason, failure_count, "Realtime disabled");
        self.bus.emit(UiEvent::RealtimeDisabled {
            reason: reason.to_string(),
            failure_count,
        });
    }

    fn settle_idle(&self, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.phase = Phase::Idle;
        true
    }

    fn schedule(self: &Arc<Self>, generation: u64, delay: Duration) {
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.reconnect(generation).await;
            }
        });

        let mut state = self.state.lock();
        if state.generation == generation {
            state.reconnect = Some(task);
        } else {
            task.abort();
        }
    }

    async fn reconnect(self: &Arc<Self>, generation: u64) {
        if self.state.lock().generation != generation {
            return;
        }
        let Some(token) = self.credentials.get_token().await else {
            self.give_up(generation, NO_CREDENTIAL);
            return;
        };
        self.run_attempts(generation, token).await;
    }

    async fn on_transport_failed(
        self: &Arc<Self>,
        generation: u64,
        epoch: u64,
        method: TransportMethod,
        error: TidingsError,
    ) {
        let transport = {
            let mut state = self.state.lock();
            if state.generation != generation || state.epoch != epoch {
                return;
            }
            state.phase = Phase::Connecting;
            state.pump = None;
            state.active.take()
        };
        if let Some(transport) = transport {
            transport.disconnect().await;
        }
        TidingsMetrics::set_connected(method.as_str(), false);
        warn!(method = %method, error = %error, "Transport failed");

        match self.on_failure(generation, method, &error) {
            Next::RetryNow => self.schedule(generation, Duration::ZERO),
            Next::RetryAfter(delay) => self.schedule(generation, delay),
            Next::GiveUp => {}
        }
    }

    async fn disconnect(&self) {
        let transport = {
            let mut state = self.state.lock();
            state.generation += 1;
            state.phase = Phase::Idle;
            state.attempts = 0;
            if let Some(task) = state.reconnect.take() {
                task.abort();
            }
            if let Some(task) = state.pump.take() {
                task.abort();
            }
            state.connecting = None;
            state.active.take()
        };
        self.breaker.abandon_trial();

        if let Some(transport) = transport {
            let method = transport.method();
            transport.disconnect().await;
            TidingsMetrics::set_connected(method.as_str(), false);
            info!(method = %method, "Realtime disconnected");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(task) = state.reconnect.take() {
            task.abort();
        }
        if let Some(task) = state.pump.take() {
            task.abort();
        }
    }
}

/// Forwards transport events until the transport fails or is replaced.
async fn pump(
    inner: Weak<Inner>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    generation: u64,
    epoch: u64,
    method: TransportMethod,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        {
            let state = inner.state.lock();
            if state.generation != generation || state.epoch != epoch {
                break;
            }
        }
        match event {
            TransportEvent::Message(message) => {
                inner.router.route(&message);
            }
            TransportEvent::Failed(error) => {
                inner.on_transport_failed(generation, epoch, method, error).await;
                break;
            }
        }
    }
    debug!(method = %method, epoch, "Event pump stopped");
}

/// Builder for [`RealtimeClient`].
pub struct RealtimeClientBuilder {
    config: SupervisorConfig,
    factory: Option<Arc<dyn TransportFactory>>,
    credentials: Option<Arc<CredentialProvider>>,
    clock: SharedClock,
    table: RoutingTable,
}

impl RealtimeClientBuilder {
    fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            factory: None,
            credentials: None,
            clock: SystemClock::shared(),
            table: RoutingTable::default(),
        }
    }

    /// Sets the transport factory. Required.
    #[must_use]
    pub fn factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Sets the credential provider. Without one, tokens must be passed to
    /// `connect()`.
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the clock used by the circuit breaker.
    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the routing table.
    #[must_use]
    pub fn routing_table(mut self, table: RoutingTable) -> Self {
        self.table = table;
        self
    }

    /// Builds the client.
    pub fn build(self) -> std::result::Result<RealtimeClient, ConfigError> {
        let factory = self
            .factory
            .ok_or_else(|| ConfigError::missing_field("factory"))?;
        let credentials = self.credentials.unwrap_or_else(|| {
            Arc::new(CredentialProvider::new(
                Duration::from_secs(60),
                self.clock.clone(),
            ))
        });
        let bus = EventBus::new(self.config.event_capacity);
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig {
                failure_threshold: self.config.failure_threshold,
                cooldown: self.config.circuit_cooldown,
            },
            self.clock,
        );

        Ok(RealtimeClient {
            inner: Arc::new(Inner {
                policy: ReconnectPolicy::from_config(&self.config),
                config: self.config,
                factory,
                credentials,
                router: MessageRouter::with_table(self.table, bus.clone()),
                bus,
                breaker,
                state: parking_lot::Mutex::new(SupervisorState::default()),
            }),
        })
    }
}
