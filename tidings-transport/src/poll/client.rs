//! Long-poll transport.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tidings_core::clock::{SharedClock, SystemClock};
use tidings_core::error::{NetworkError, Result, TidingsError, TransportError};
use tidings_core::types::{Channel, Message, Token, TransportMethod};
use tidings_telemetry::metrics::TidingsMetrics;
use tidings_telemetry::spans::poll_span;
use tokio::sync::Notify;
use tracing::{Instrument, debug, info, warn};

use super::api::PollApi;
use super::backoff::PollBackoff;
use super::config::PollConfig;
use super::session::PollSession;
use crate::transport::{EventSender, TokenRefresher, Transport, TransportEvent};
use crate::ws::DEFAULT_MESSAGE_TYPE;

/// Result of one poll cycle.
#[derive(Debug)]
enum PollOutcome {
    /// Another poll was already in flight, or there is no session.
    Skipped,
    /// The transport was stopped while the request was in flight.
    Discarded,
    Delivered(usize),
    SessionRecreated,
    Failed,
    /// The failure budget is exhausted; report to the supervisor.
    Escalate(TidingsError),
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct PollInner<A> {
    api: A,
    config: PollConfig,
    clock: SharedClock,
    refresher: Option<Arc<dyn TokenRefresher>>,
    token: RwLock<Option<Token>>,
    channels: Mutex<Vec<Channel>>,
    session: Mutex<Option<PollSession>>,
    events: Mutex<Option<EventSender>>,
    backoff: Mutex<PollBackoff>,
    session_failures: AtomicU32,
    polling: AtomicBool,
    generation: AtomicU64,
    in_flight: AtomicBool,
    shutdown: Notify,
}

/// HTTP long-poll transport.
///
/// `connect` creates a server session; a background loop then fetches
/// messages newer than the session cursor. Generic failures back off
/// exponentially and are reported to the supervisor only after
/// `max_consecutive_failures`. A 401/403 re-creates the session locally and
/// escalates only past `session_failure_ceiling`.
///
/// At most one poll request is in flight at a time. Results that arrive
/// after `disconnect` are discarded.
pub struct PollTransport<A: PollApi + 'static> {
    inner: Arc<PollInner<A>>,
}

impl<A: PollApi + 'static> PollTransport<A> {
    /// Creates an idle poll transport.
    #[must_use]
    pub fn new(api: A, config: PollConfig) -> Self {
        let backoff = PollBackoff::new(config.interval(), config.max_interval());
        Self {
            inner: Arc::new(PollInner {
                api,
                config,
                clock: SystemClock::shared(),
                refresher: None,
                token: RwLock::new(None),
                channels: Mutex::new(Vec::new()),
                session: Mutex::new(None),
                events: Mutex::new(None),
                backoff: Mutex::new(backoff),
                session_failures: AtomicU32::new(0),
                polling: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                in_flight: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
        }
    }

    /// Replaces the clock used for the session cursor.
    ///
    /// Must be called before the transport is shared.
    #[must_use]
    pub fn with_clock(self, clock: SharedClock) -> Self {
        self.map_inner(|inner| inner.clock = clock)
    }

    /// Sets the source of fresh tokens used when a session is rejected.
    #[must_use]
    pub fn with_token_refresher(self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.map_inner(|inner| inner.refresher = Some(refresher))
    }

    fn map_inner(mut self, f: impl FnOnce(&mut PollInner<A>)) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            f(inner);
        }
        self
    }

    /// Triggers a poll immediately.
    ///
    /// Returns `false` without issuing a request when the transport is not
    /// polling or another poll is already in flight.
    pub async fn poll_now(&self) -> bool {
        if !self.inner.polling.load(Ordering::Acquire) {
            return false;
        }
        let generation = self.inner.generation.load(Ordering::Acquire);
        match self.inner.poll_once(generation).await {
            PollOutcome::Skipped => false,
            PollOutcome::Escalate(error) => {
                self.inner.fail(generation, error);
                true
            }
            _ => true,
        }
    }

    /// Current session id, if a session exists.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.inner.session.lock().as_ref().map(|s| s.session_id.clone())
    }

    /// Consecutive generic poll failures.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.backoff.lock().failures()
    }

    /// Returns true while the poll loop runs.
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner.polling.load(Ordering::Acquire)
    }
}

impl<A: PollApi + 'static> PollInner<A> {
    fn is_current(&self, generation: u64) -> bool {
        self.polling.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }

    fn stop(&self) {
        self.polling.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.shutdown.notify_waiters();
    }

    fn current_token(&self) -> Option<Token> {
        self.token.read().clone()
    }

    async fn poll_once(&self, generation: u64) -> PollOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Poll already in flight, skipping");
            return PollOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);

        let Some(token) = self.current_token() else {
            return PollOutcome::Skipped;
        };
        let Some(session) = self.session.lock().clone() else {
            return PollOutcome::Skipped;
        };

        let failures = self.backoff.lock().failures();
        let result = self
            .api
            .fetch(&token, &session.session_id, session.since)
            .instrument(poll_span(&session.session_id, failures))
            .await;

        if !self.is_current(generation) {
            debug!("Discarding poll result that arrived after stop");
            return PollOutcome::Discarded;
        }

        match result {
            Ok(messages) => self.deliver(messages),
            Err(e) if e.is_auth_rejection() => self.recreate_session(generation, e).await,
            Err(e) => self.record_failure(e),
        }
    }

    fn deliver(&self, messages: Vec<Message>) -> PollOutcome {
        self.backoff.lock().record_success();
        self.session_failures.store(0, Ordering::Release);
        if let Some(session) = self.session.lock().as_mut() {
            session.advance(&messages);
        }

        let count = messages.len();
        if let Some(events) = self.events.lock().as_ref() {
            for message in messages {
                let _ = events.send(TransportEvent::Message(message));
            }
        }
        PollOutcome::Delivered(count)
    }

    fn record_failure(&self, error: TidingsError) -> PollOutcome {
        let failures = {
            let mut backoff = self.backoff.lock();
            backoff.record_failure();
            backoff.failures()
        };

        let status = match &error {
            TidingsError::Network(NetworkError::Http { status_code, .. }) => status_code.to_string(),
            TidingsError::Network(NetworkError::Timeout { .. }) => "timeout".to_string(),
            _ => "error".to_string(),
        };
        TidingsMetrics::poll_failed(&status);

        if failures >= self.config.max_consecutive_failures {
            return PollOutcome::Escalate(error);
        }
        warn!(error = %error, failures, "Poll failed, backing off");
        PollOutcome::Failed
    }

    async fn recreate_session(&self, generation: u64, error: TidingsError) -> PollOutcome {
        TidingsMetrics::poll_failed("auth");
        let attempts = self.session_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if attempts > self.config.session_failure_ceiling {
            return PollOutcome::Escalate(error);
        }
        warn!(error = %error, attempts, "Poll session rejected, recreating");

        if let Some(refresher) = &self.refresher
            && let Some(fresh) = refresher.refresh_token().await
        {
            *self.token.write() = Some(fresh);
        }
        let Some(token) = self.current_token() else {
            return PollOutcome::Escalate(error);
        };
        let channels = self.channels.lock().clone();

        match self.api.create_session(&token, &channels).await {
            Ok(session_id) => {
                if !self.is_current(generation) {
                    return PollOutcome::Discarded;
                }
                let mut session = self.session.lock();
                let since = session.as_ref().map_or_else(|| self.clock.utc_now(), |s| s.since);
                *session = Some(PollSession { session_id, since });
                TidingsMetrics::poll_session_created();
                PollOutcome::SessionRecreated
            }
            Err(e) => self.record_failure(e),
        }
    }

    fn fail(&self, generation: u64, error: TidingsError) {
        if !self.is_current(generation) {
            return;
        }
        self.polling.store(false, Ordering::Release);
        TidingsMetrics::transport_failed(TransportMethod::Poll.as_str());
        TidingsMetrics::set_connected(TransportMethod::Poll.as_str(), false);
        warn!(error = %error, "Poll transport giving up");
        if let Some(events) = self.events.lock().take() {
            let _ = events.send(TransportEvent::Failed(error));
        }
    }

    async fn run(self: Arc<Self>, generation: u64) {
        loop {
            if !self.is_current(generation) {
                break;
            }

            match self.poll_once(generation).await {
                PollOutcome::Escalate(error) => {
                    self.fail(generation, error);
                    break;
                }
                PollOutcome::Discarded => break,
                PollOutcome::Delivered(count) if count > 0 => {
                    debug!(count, "Poll delivered messages");
                }
                _ => {}
            }

            let delay = self.backoff.lock().next_delay();
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown.notified() => {}
            }
        }
        debug!(generation, "Poll loop stopped");
    }
}

#[async_trait]
impl<A: PollApi + 'static> Transport for PollTransport<A> {
    fn method(&self) -> TransportMethod {
        TransportMethod::Poll
    }

    async fn connect(&self, token: &Token, channels: &[Channel], events: EventSender) -> Result<()> {
        if self.is_polling() {
            return Ok(());
        }
        TidingsMetrics::connect_attempt(TransportMethod::Poll.as_str());

        *self.inner.token.write() = Some(token.clone());
        *self.inner.channels.lock() = channels.to_vec();

        let session_id = self.inner.api.create_session(token, channels).await?;
        TidingsMetrics::poll_session_created();

        *self.inner.session.lock() =
            Some(PollSession::new(session_id.clone(), self.inner.clock.utc_now()));
        *self.inner.events.lock() = Some(events);
        self.inner.backoff.lock().record_success();
        self.inner.session_failures.store(0, Ordering::Release);

        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.polling.store(true, Ordering::Release);
        tokio::spawn(Arc::clone(&self.inner).run(generation));

        TidingsMetrics::set_connected(TransportMethod::Poll.as_str(), true);
        info!(session_id = %session_id, channels = channels.len(), "Poll session started");
        Ok(())
    }

    async fn disconnect(&self) {
        self.inner.stop();
        self.inner.events.lock().take();

        let session = self.inner.session.lock().take();
        if let Some(session) = session
            && let Some(token) = self.inner.current_token()
            && let Err(e) = self.inner.api.destroy_session(&token, &session.session_id).await
        {
            debug!(error = %e, "Failed to end poll session");
        }

        TidingsMetrics::set_connected(TransportMethod::Poll.as_str(), false);
        debug!("Poll transport disconnected");
    }

    async fn subscribe(&self, channel: &Channel) -> Result<()> {
        {
            let mut channels = self.inner.channels.lock();
            if !channels.contains(channel) {
                channels.push(channel.clone());
            }
        }
        let session_id = self.session_id();
        match (self.inner.current_token(), session_id) {
            (Some(token), Some(session_id)) => {
                self.inner.api.subscribe(&token, &session_id, channel).await
            }
            _ => Ok(()),
        }
    }

    async fn unsubscribe(&self, channel: &Channel) -> Result<()> {
        self.inner.channels.lock().retain(|c| c != channel);
        let session_id = self.session_id();
        match (self.inner.current_token(), session_id) {
            (Some(token), Some(session_id)) => {
                self.inner.api.unsubscribe(&token, &session_id, channel).await
            }
            _ => Ok(()),
        }
    }

    async fn publish(&self, channel: &Channel, data: Value, kind: Option<&str>) -> Result<()> {
        let token = self
            .inner
            .current_token()
            .ok_or(TidingsError::Transport(TransportError::NotConnected))?;
        self.inner
            .api
            .publish(&token, channel, data, kind.unwrap_or(DEFAULT_MESSAGE_TYPE))
            .await
    }

    fn is_ready(&self) -> bool {
        self.is_polling() && self.inner.session.lock().is_some()
    }
}

impl<A: PollApi + 'static> Drop for PollTransport<A> {
    fn drop(&mut self) {
        self.inner.stop();
    }
}
