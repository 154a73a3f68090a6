//! Supervisor driving a real poll transport when the socket endpoint is gone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tidings_client::config::SupervisorConfig;
use tidings_client::credential::{CredentialProvider, StaticTokenSource};
use tidings_client::events::UiEvent;
use tidings_client::RealtimeClient;
use tidings_core::clock::SystemClock;
use tidings_core::error::{NetworkError, Result, TransportError};
use tidings_core::types::{Channel, Message, MessageKind, Token, TransportMethod};
use tidings_transport::poll::{PollApi, PollConfig, PollTransport};
use tidings_transport::{TokenRefresher, Transport, TransportFactory};
use tokio::sync::broadcast::error::TryRecvError;

#[derive(Default)]
struct ApiState {
    fetch_script: Mutex<VecDeque<Result<Vec<Message>>>>,
    sessions_created: AtomicUsize,
    tokens_seen: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
struct FakePollApi {
    state: Arc<ApiState>,
}

#[async_trait]
impl PollApi for FakePollApi {
    async fn create_session(&self, token: &Token, _channels: &[Channel]) -> Result<String> {
        self.state.tokens_seen.lock().push(token.expose().to_string());
        let n = self.state.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("session-{n}"))
    }

    async fn subscribe(&self, _: &Token, _: &str, _: &Channel) -> Result<()> {
        Ok(())
    }

    async fn unsubscribe(&self, _: &Token, _: &str, _: &Channel) -> Result<()> {
        Ok(())
    }

    async fn destroy_session(&self, _: &Token, _: &str) -> Result<()> {
        Ok(())
    }

    async fn publish(&self, _: &Token, _: &Channel, _: Value, _: &str) -> Result<()> {
        Ok(())
    }

    async fn fetch(&self, _: &Token, _: &str, _: DateTime<Utc>) -> Result<Vec<Message>> {
        self.state
            .fetch_script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Socket endpoint is unavailable; poll transports share one fake API.
struct PollOnlyFactory {
    api: FakePollApi,
    refresher: Arc<dyn TokenRefresher>,
}

#[async_trait]
impl TransportFactory for PollOnlyFactory {
    async fn create(&self, method: TransportMethod, _token: &Token) -> Result<Arc<dyn Transport>> {
        match method {
            TransportMethod::Socket => Err(TransportError::Unavailable {
                method: method.to_string(),
                reason: "no socket url".to_string(),
            }
            .into()),
            TransportMethod::Poll => {
                let config = PollConfig {
                    interval_ms: 1_000,
                    max_interval_ms: 8_000,
                    max_consecutive_failures: 3,
                    session_failure_ceiling: 2,
                };
                Ok(Arc::new(
                    PollTransport::new(self.api.clone(), config)
                        .with_token_refresher(Arc::clone(&self.refresher)),
                ))
            }
        }
    }
}

fn unauthorized() -> tidings_core::error::TidingsError {
    NetworkError::Http {
        status_code: 401,
        reason: "Unauthorized".to_string(),
    }
    .into()
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn rejected_poll_session_is_recreated_without_supervisor_failure() {
    let api = FakePollApi::default();
    api.state.fetch_script.lock().extend([
        Err(unauthorized()),
        Ok(vec![Message::new(
            Channel::activity_feed(42),
            MessageKind::ActivityUpdate,
            json!({"actor": "sam"}),
            Utc::now(),
        )]),
    ]);

    let credentials = Arc::new(
        CredentialProvider::new(Duration::from_secs(60), SystemClock::shared())
            .with_source(StaticTokenSource::new("primary", Some("fresh-n0nce-9".to_string()))),
    );
    let factory = PollOnlyFactory {
        api: api.clone(),
        refresher: credentials.clone(),
    };
    let client = RealtimeClient::builder(SupervisorConfig::default())
        .factory(Arc::new(factory))
        .credentials(credentials)
        .build()
        .unwrap();
    let mut events = client.events();

    client.subscribe(Channel::activity_feed(42)).await.unwrap();
    assert!(client.connect(None).await);
    assert_eq!(client.status().method, Some(TransportMethod::Poll));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    settle().await;

    assert!(api.state.sessions_created.load(Ordering::SeqCst) >= 2);
    assert!(
        api.state
            .tokens_seen
            .lock()
            .iter()
            .all(|token| token == "fresh-n0nce-9")
    );

    let status = client.status();
    assert!(status.connected);
    assert_eq!(status.failure_count, 0);
    assert!(status.circuit.state.is_closed());

    assert!(matches!(
        events.try_recv(),
        Ok(UiEvent::RealtimeEnabled {
            method: TransportMethod::Poll
        })
    ));
    match events.try_recv() {
        Ok(UiEvent::Update { name, data, .. }) => {
            assert_eq!(name, MessageKind::ActivityUpdate);
            assert_eq!(data["actor"], "sam");
        }
        other => panic!("expected activity update, got {other:?}"),
    }
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    client.disconnect().await;
    assert!(!client.status().connected);
}
