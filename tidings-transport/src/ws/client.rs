//! Socket transport: authenticate handshake, heartbeat and the pre-ready queue.

#![allow(clippy::too_many_lines)]

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tidings_core::clock::{SharedClock, SystemClock};
use tidings_core::error::{NetworkError, ProtocolError, Result, TidingsError, TransportError};
use tidings_core::types::{Channel, Token, TransportMethod};
use tidings_telemetry::metrics::TidingsMetrics;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use super::config::SocketConfig;
use super::frame::{Frame, unwrap_message};
use super::state::{InternalState, SocketState};
use crate::transport::{EventSender, Transport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;
type WsSource = SplitStream<WsStream>;

/// How long `disconnect` waits for the connection task to close the socket.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

struct ConnectionHandle {
    send_tx: mpsc::UnboundedSender<Frame>,
    shutdown_tx: oneshot::Sender<()>,
    task: Option<JoinHandle<()>>,
}

/// Persistent WebSocket transport.
///
/// `connect` opens the socket, sends `authenticate` and waits for
/// `authenticated`. It then re-subscribes the given channels and flushes
/// anything queued while the socket was not ready, in that order.
///
/// The transport never reconnects. Any unexpected close or error is reported
/// once as [`TransportEvent::Failed`].
///
/// ```ignore
/// let socket = SocketTransport::new(SocketConfig::builder().url(url).build());
/// socket.publish(&channel, json!({"content": "hi"}), None).await?; // queued
/// socket.connect(&token, &[channel.clone()], events_tx).await?;     // flushed here
/// ```
pub struct SocketTransport {
    config: SocketConfig,
    clock: SharedClock,
    state: Arc<RwLock<InternalState>>,
    pending: Mutex<VecDeque<Frame>>,
    conn: Mutex<Option<ConnectionHandle>>,
}

impl SocketTransport {
    /// Creates an unconnected socket transport.
    #[must_use]
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            clock: SystemClock::shared(),
            state: Arc::new(RwLock::new(InternalState::default())),
            pending: Mutex::new(VecDeque::new()),
            conn: Mutex::new(None),
        }
    }

    /// Replaces the clock used to timestamp inbound messages.
    #[must_use]
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> SocketState {
        self.state.read().state
    }

    /// Number of frames waiting for the socket to become ready.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns the endpoint this transport connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }

    fn set_state(&self, state: SocketState) {
        self.state.write().state = state;
    }

    /// Sends `frame` if ready, otherwise appends it to the FIFO queue.
    fn send_or_queue(&self, frame: Frame) -> Result<()> {
        let mut pending = self.pending.lock();
        if self.state.read().state.is_ready()
            && let Some(conn) = self.conn.lock().as_ref()
        {
            return conn
                .send_tx
                .send(frame)
                .map_err(|_| TidingsError::from(TransportError::Closed));
        }
        debug!(frame = frame.type_name(), queued = pending.len() + 1, "Socket not ready, queued");
        pending.push_back(frame);
        Ok(())
    }

    async fn open(&self) -> Result<WsStream> {
        if self.config.url.is_empty() {
            return Err(TransportError::Unavailable {
                method: TransportMethod::Socket.to_string(),
                reason: "no socket URL configured".to_string(),
            }
            .into());
        }

        let (stream, _) = timeout(self.config.connect_timeout(), connect_async(&self.config.url))
            .await
            .map_err(|_| NetworkError::Timeout {
                timeout_ms: self.config.connect_timeout_ms,
            })?
            .map_err(|e| NetworkError::ConnectionFailed {
                reason: e.to_string(),
            })?;
        Ok(stream)
    }

    async fn handshake(&self, sink: &mut WsSink, stream: &mut WsSource, token: &Token) -> Result<()> {
        let auth = Frame::Authenticate {
            token: token.expose().to_string(),
        };
        send_frame(sink, &auth).await?;

        timeout(self.config.handshake_timeout(), await_authenticated(sink, stream))
            .await
            .map_err(|_| NetworkError::Timeout {
                timeout_ms: self.config.handshake_timeout_ms,
            })?
    }
}

#[async_trait]
impl Transport for SocketTransport {
    fn method(&self) -> TransportMethod {
        TransportMethod::Socket
    }

    async fn connect(&self, token: &Token, channels: &[Channel], events: EventSender) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        TidingsMetrics::connect_attempt(TransportMethod::Socket.as_str());
        self.set_state(SocketState::Connecting);

        let ws = match self.open().await {
            Ok(ws) => ws,
            Err(e) => {
                self.state.write().mark_closed();
                return Err(e);
            }
        };
        self.set_state(SocketState::Open);

        let (mut sink, mut stream) = ws.split();
        self.set_state(SocketState::Authenticating);
        if let Err(e) = self.handshake(&mut sink, &mut stream, token).await {
            warn!(url = %self.config.url, error = %e, "Socket handshake failed");
            let _ = sink.close().await;
            self.state.write().mark_closed();
            return Err(e);
        }

        let (send_tx, send_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        for channel in channels {
            let _ = send_tx.send(Frame::Subscribe {
                channel: channel.clone(),
            });
        }

        let flushed = {
            let mut pending = self.pending.lock();
            let flushed = pending.len();
            for frame in pending.drain(..) {
                let _ = send_tx.send(frame);
            }
            *self.conn.lock() = Some(ConnectionHandle {
                send_tx,
                shutdown_tx,
                task: None,
            });
            self.state.write().mark_ready(Instant::now());
            flushed
        };

        let task = tokio::spawn(run_connection(
            sink,
            stream,
            send_rx,
            shutdown_rx,
            Arc::clone(&self.state),
            events,
            self.clock.clone(),
            self.config.heartbeat_interval(),
        ));
        if let Some(conn) = self.conn.lock().as_mut() {
            conn.task = Some(task);
        }

        TidingsMetrics::set_connected(TransportMethod::Socket.as_str(), true);
        info!(
            url = %self.config.url,
            channels = channels.len(),
            flushed,
            "Socket ready"
        );
        Ok(())
    }

    async fn disconnect(&self) {
        let handle = {
            let _pending = self.pending.lock();
            self.set_state(SocketState::Closing);
            self.conn.lock().take()
        };

        if let Some(handle) = handle {
            let _ = handle.shutdown_tx.send(());
            if let Some(task) = handle.task
                && timeout(SHUTDOWN_GRACE, task).await.is_err()
            {
                debug!("Socket task did not stop within grace period");
            }
        }

        self.pending.lock().clear();
        self.state.write().mark_closed();
        TidingsMetrics::set_connected(TransportMethod::Socket.as_str(), false);
        debug!(url = %self.config.url, "Socket disconnected");
    }

    async fn subscribe(&self, channel: &Channel) -> Result<()> {
        self.send_or_queue(Frame::Subscribe {
            channel: channel.clone(),
        })
    }

    async fn unsubscribe(&self, channel: &Channel) -> Result<()> {
        self.send_or_queue(Frame::Unsubscribe {
            channel: channel.clone(),
        })
    }

    async fn publish(&self, channel: &Channel, data: Value, kind: Option<&str>) -> Result<()> {
        self.send_or_queue(Frame::Publish {
            channel: channel.clone(),
            data,
            message_type: kind.map(str::to_string),
        })
    }

    fn is_ready(&self) -> bool {
        self.state.read().state.is_ready()
    }
}

impl Drop for SocketTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.conn.get_mut().take() {
            let _ = handle.shutdown_tx.send(());
        }
    }
}

async fn send_frame(sink: &mut WsSink, frame: &Frame) -> Result<()> {
    let text = frame.encode()?;
    sink.send(WsMessage::Text(text))
        .await
        .map_err(|e| NetworkError::WebSocket {
            reason: e.to_string(),
        })?;
    Ok(())
}

/// Reads until `authenticated`, answering pings on the way.
async fn await_authenticated(sink: &mut WsSink, stream: &mut WsSource) -> Result<()> {
    while let Some(next) = stream.next().await {
        let msg = next.map_err(|e| NetworkError::WebSocket {
            reason: e.to_string(),
        })?;
        match msg {
            WsMessage::Text(text) => match Frame::decode(&text) {
                Ok(Frame::Authenticated) => return Ok(()),
                Ok(Frame::Error { message }) => {
                    return Err(ProtocolError::HandshakeRejected { reason: message }.into());
                }
                Ok(Frame::Ping) => send_frame(sink, &Frame::Pong).await?,
                Ok(other) => {
                    debug!(frame = other.type_name(), "Ignoring frame before authentication");
                }
                Err(e) => warn!(error = %e, "Undecodable frame during handshake"),
            },
            WsMessage::Ping(data) => {
                let _ = sink.send(WsMessage::Pong(data)).await;
            }
            WsMessage::Close(frame) => {
                let reason = frame.map_or_else(|| "closed during handshake".to_string(), |f| {
                    f.reason.to_string()
                });
                return Err(NetworkError::ConnectionClosed { reason }.into());
            }
            _ => {}
        }
    }
    Err(NetworkError::ConnectionClosed {
        reason: "stream ended during handshake".to_string(),
    }
    .into())
}

/// Reports a failure unless the owner is already tearing the connection down.
fn report_failure(state: &RwLock<InternalState>, events: &EventSender, error: TidingsError) {
    let intentional = {
        let mut state = state.write();
        let intentional = matches!(state.state, SocketState::Closing | SocketState::Closed);
        state.mark_closed();
        intentional
    };
    TidingsMetrics::set_connected(TransportMethod::Socket.as_str(), false);
    if intentional {
        return;
    }
    warn!(error = %error, "Socket connection failed");
    TidingsMetrics::transport_failed(TransportMethod::Socket.as_str());
    let _ = events.send(TransportEvent::Failed(error));
}

#[allow(clippy::too_many_arguments)]
async fn run_connection(
    mut sink: WsSink,
    mut stream: WsSource,
    mut send_rx: mpsc::UnboundedReceiver<Frame>,
    mut shutdown_rx: oneshot::Receiver<()>,
    state: Arc<RwLock<InternalState>>,
    events: EventSender,
    clock: SharedClock,
    heartbeat: Duration,
) {
    let mut heartbeat_interval = interval_at(Instant::now() + heartbeat, heartbeat);
    heartbeat_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => {
                debug!("Shutdown signal received");
                let _ = sink.send(WsMessage::Close(None)).await;
                let _ = sink.close().await;
                break;
            }

            Some(frame) = send_rx.recv() => {
                if let Err(e) = send_frame(&mut sink, &frame).await {
                    report_failure(&state, &events, e);
                    break;
                }
            }

            next = stream.next() => {
                match next {
                    Some(Ok(WsMessage::Text(text))) => {
                        state.write().record_message(Instant::now());
                        match Frame::decode(&text) {
                            Ok(Frame::Message { channel, data, message_type }) => {
                                let message =
                                    unwrap_message(channel, message_type, data, clock.utc_now());
                                let _ = events.send(TransportEvent::Message(message));
                            }
                            Ok(Frame::Ping) => {
                                if let Err(e) = send_frame(&mut sink, &Frame::Pong).await {
                                    report_failure(&state, &events, e);
                                    break;
                                }
                            }
                            Ok(Frame::Pong) => state.write().record_pong(Instant::now()),
                            Ok(Frame::Error { message }) => {
                                warn!(reason = %message, "Server reported error");
                            }
                            Ok(other) => debug!(frame = other.type_name(), "Ignoring frame"),
                            Err(e) => warn!(error = %e, "Undecodable frame"),
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = sink.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Pong(_))) => state.write().record_pong(Instant::now()),
                    Some(Ok(WsMessage::Close(frame))) => {
                        let reason = frame
                            .map_or_else(|| "server closed connection".to_string(), |f| f.reason.to_string());
                        report_failure(&state, &events, NetworkError::ConnectionClosed { reason }.into());
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        report_failure(
                            &state,
                            &events,
                            NetworkError::WebSocket { reason: e.to_string() }.into(),
                        );
                        break;
                    }
                    None => {
                        report_failure(
                            &state,
                            &events,
                            NetworkError::ConnectionClosed { reason: "stream ended".to_string() }.into(),
                        );
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                state.write().record_ping(Instant::now());
                if let Err(e) = send_frame(&mut sink, &Frame::Ping).await {
                    report_failure(&state, &events, e);
                    break;
                }
                debug!("Ping sent");
            }
        }
    }
}
