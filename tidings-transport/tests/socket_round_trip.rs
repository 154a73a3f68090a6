use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tidings_core::error::{NetworkError, ProtocolError, TidingsError};
use tidings_core::types::{Channel, MessageKind, Token};
use tidings_transport::prelude::*;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, accept_async};

type ServerWs = WebSocketStream<TcpStream>;

static TRACING: OnceLock<()> = OnceLock::new();

fn init_tracing() {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    });
}

/// Accepts one connection on a loopback port and hands it to `handler`.
async fn serve_once<F, Fut>(handler: F) -> String
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _peer) = listener.accept().await.unwrap();
        let ws = accept_async(tcp).await.unwrap();
        handler(ws).await;
    });
    format!("ws://{addr}")
}

/// Next JSON text frame, skipping transport-level control frames.
async fn next_json(ws: &mut ServerWs) -> Option<Value> {
    while let Some(Ok(msg)) = ws.next().await {
        match msg {
            WsMessage::Text(text) => return serde_json::from_str(&text).ok(),
            WsMessage::Close(_) => return None,
            _ => {}
        }
    }
    None
}

async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(WsMessage::Text(value.to_string())).await.unwrap();
}

/// Reads `authenticate` and answers `authenticated`; returns the token sent.
async fn accept_handshake(ws: &mut ServerWs) -> String {
    let auth = next_json(ws).await.unwrap();
    assert_eq!(auth["type"], "authenticate");
    send_json(ws, json!({"type": "authenticated"})).await;
    auth["token"].as_str().unwrap_or_default().to_string()
}

fn token() -> Token {
    Token::new("n0nce-abc123").unwrap()
}

fn socket(url: String) -> SocketTransport {
    SocketTransport::new(
        SocketConfig::builder()
            .url(url)
            .handshake_timeout(Duration::from_millis(500))
            .heartbeat_interval(Duration::from_secs(60))
            .build(),
    )
}

#[tokio::test]
async fn handshake_then_resubscribe_then_flush_queue() {
    init_tracing();
    let (tx, rx) = oneshot::channel();

    let url = serve_once(|mut ws| async move {
        let token = accept_handshake(&mut ws).await;
        let mut frames = Vec::new();
        for _ in 0..3 {
            frames.push(next_json(&mut ws).await.unwrap());
        }
        let _ = tx.send((token, frames));
    })
    .await;

    let transport = socket(url);
    let comments = Channel::comments_post(7);
    let activity = Channel::activity_feed(42);

    transport
        .publish(&comments, json!({"content": "queued"}), Some("new_comment"))
        .await
        .unwrap();
    assert_eq!(transport.pending_len(), 1);

    let (events, _events_rx) = mpsc::unbounded_channel();
    transport
        .connect(&token(), &[comments.clone(), activity.clone()], events)
        .await
        .unwrap();
    assert!(transport.is_ready());
    assert_eq!(transport.state(), SocketState::Ready);
    assert_eq!(transport.pending_len(), 0);

    let (sent_token, frames) = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    assert_eq!(sent_token, "n0nce-abc123");
    assert_eq!(frames[0], json!({"type": "subscribe", "channel": "comments_post_7"}));
    assert_eq!(frames[1], json!({"type": "subscribe", "channel": "activity_feed_42"}));
    assert_eq!(frames[2]["type"], "publish");
    assert_eq!(frames[2]["message_type"], "new_comment");
    assert_eq!(frames[2]["data"]["content"], "queued");

    transport.disconnect().await;
}

#[tokio::test]
async fn inbound_message_frames_are_unwrapped() {
    init_tracing();

    let url = serve_once(|mut ws| async move {
        accept_handshake(&mut ws).await;
        send_json(
            &mut ws,
            json!({
                "type": "message",
                "channel": "comments_post_7",
                "data": {"type": "new_comment", "data": {"id": 11, "content": "hello"}}
            }),
        )
        .await;
        // keep the socket open until the client leaves
        while next_json(&mut ws).await.is_some() {}
    })
    .await;

    let transport = socket(url);
    let (events, mut events_rx) = mpsc::unbounded_channel();
    transport
        .connect(&token(), &[Channel::comments_post(7)], events)
        .await
        .unwrap();

    match timeout(Duration::from_secs(5), events_rx.recv()).await.unwrap() {
        Some(TransportEvent::Message(message)) => {
            assert_eq!(message.channel.as_str(), "comments_post_7");
            assert_eq!(message.kind, MessageKind::NewComment);
            assert_eq!(message.data, json!({"id": 11, "content": "hello"}));
        }
        other => panic!("expected message, got {other:?}"),
    }

    transport.disconnect().await;
}

#[tokio::test]
async fn server_ping_frame_gets_pong() {
    init_tracing();
    let (tx, rx) = oneshot::channel();

    let url = serve_once(|mut ws| async move {
        accept_handshake(&mut ws).await;
        send_json(&mut ws, json!({"type": "ping"})).await;
        let reply = next_json(&mut ws).await;
        let _ = tx.send(reply);
    })
    .await;

    let transport = socket(url);
    let (events, _events_rx) = mpsc::unbounded_channel();
    transport.connect(&token(), &[], events).await.unwrap();

    let reply = timeout(Duration::from_secs(5), rx).await.unwrap().unwrap();
    assert_eq!(reply, Some(json!({"type": "pong"})));

    transport.disconnect().await;
}

#[tokio::test]
async fn rejected_handshake_fails_connect() {
    init_tracing();

    let url = serve_once(|mut ws| async move {
        let _ = next_json(&mut ws).await;
        send_json(&mut ws, json!({"type": "error", "message": "invalid nonce"})).await;
        let _ = next_json(&mut ws).await;
    })
    .await;

    let transport = socket(url);
    let (events, _events_rx) = mpsc::unbounded_channel();
    let err = transport.connect(&token(), &[], events).await.unwrap_err();

    assert!(matches!(
        &err,
        TidingsError::Protocol(ProtocolError::HandshakeRejected { reason }) if reason == "invalid nonce"
    ));
    assert!(err.is_auth_rejection());
    assert_eq!(transport.state(), SocketState::Closed);
}

#[tokio::test]
async fn silent_server_times_out_handshake() {
    init_tracing();

    let url = serve_once(|mut ws| async move {
        let _ = next_json(&mut ws).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    })
    .await;

    let transport = socket(url);
    let (events, _events_rx) = mpsc::unbounded_channel();
    let err = transport.connect(&token(), &[], events).await.unwrap_err();

    assert!(matches!(
        err,
        TidingsError::Network(NetworkError::Timeout { timeout_ms: 500 })
    ));
    assert!(!transport.is_ready());
}

#[tokio::test]
async fn server_close_reports_failure_once() {
    init_tracing();

    let url = serve_once(|mut ws| async move {
        accept_handshake(&mut ws).await;
        let _ = ws.close(None).await;
    })
    .await;

    let transport = socket(url);
    let (events, mut events_rx) = mpsc::unbounded_channel();
    transport.connect(&token(), &[], events).await.unwrap();

    match timeout(Duration::from_secs(5), events_rx.recv()).await.unwrap() {
        Some(TransportEvent::Failed(error)) => assert!(error.is_recoverable()),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!transport.is_ready());

    // the connection task is gone, so the sender side is dropped
    assert!(timeout(Duration::from_secs(5), events_rx.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn intentional_disconnect_is_not_a_failure() {
    init_tracing();
    let (tx, rx) = oneshot::channel();

    let url = serve_once(|mut ws| async move {
        accept_handshake(&mut ws).await;
        let closed = next_json(&mut ws).await.is_none();
        let _ = tx.send(closed);
    })
    .await;

    let transport = socket(url);
    let (events, mut events_rx) = mpsc::unbounded_channel();
    transport.connect(&token(), &[], events).await.unwrap();
    transport.disconnect().await;

    assert!(timeout(Duration::from_secs(5), rx).await.unwrap().unwrap());
    assert_eq!(transport.state(), SocketState::Closed);
    assert!(timeout(Duration::from_secs(5), events_rx.recv()).await.unwrap().is_none());
}

#[tokio::test]
async fn client_heartbeat_pings_until_disconnect() {
    init_tracing();
    let (first_tx, first_rx) = oneshot::channel();
    let (rest_tx, rest_rx) = oneshot::channel();

    let url = serve_once(|mut ws| async move {
        accept_handshake(&mut ws).await;
        let ping = next_json(&mut ws).await;
        send_json(&mut ws, json!({"type": "pong"})).await;
        let _ = first_tx.send(ping);

        let mut after = Vec::new();
        while let Some(frame) = next_json(&mut ws).await {
            after.push(frame);
        }
        // nothing more once the close frame went by
        let trailing = timeout(Duration::from_millis(300), ws.next()).await;
        let quiet = !matches!(trailing, Ok(Some(Ok(WsMessage::Text(_)))));
        let _ = rest_tx.send((after, quiet));
    })
    .await;

    let transport = SocketTransport::new(
        SocketConfig::builder()
            .url(url)
            .handshake_timeout(Duration::from_millis(500))
            .heartbeat_interval(Duration::from_millis(100))
            .build(),
    );
    let (events, mut events_rx) = mpsc::unbounded_channel();
    transport.connect(&token(), &[], events).await.unwrap();

    let ping = timeout(Duration::from_secs(5), first_rx).await.unwrap().unwrap();
    assert_eq!(ping, Some(json!({"type": "ping"})));

    transport.disconnect().await;
    let (after, quiet) = timeout(Duration::from_secs(5), rest_rx).await.unwrap().unwrap();
    // at most one ping can be in flight when disconnect lands
    assert!(after.len() <= 1);
    assert!(after.iter().all(|frame| frame["type"] == "ping"));
    assert!(quiet);
    assert_eq!(transport.state(), SocketState::Closed);
    assert!(timeout(Duration::from_secs(5), events_rx.recv()).await.unwrap().is_none());
}
