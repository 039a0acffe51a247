//! Full client stack against a local axum chat backend.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use parley_chat::client::AUTH_REQUIRED_MESSAGE;
use parley_chat::{ChatClient, ChatConfig, ChatObserver, NoopObserver, SendOptions};
use parley_core::retry::ReconnectPolicy;
use parley_core::{ConnectionStatus, MessageStatus, Role};
use parley_store::ConversationState;
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Backend {
    connections: Arc<AtomicUsize>,
}

async fn spawn_backend() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/chat", get(chat))
        .route("/flaky", get(flaky))
        .route("/expired", get(expired))
        .with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let _server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

async fn send_json(socket: &mut WebSocket, value: Value) -> bool {
    socket
        .send(WsMessage::Text(value.to_string().into()))
        .await
        .is_ok()
}

/// Greets, answers chat turns, and serves history commands.
async fn chat_session(mut socket: WebSocket) {
    let welcome = json!({"type": "welcome", "message": "Hi", "session_id": "abc"});
    if !send_json(&mut socket, welcome).await {
        return;
    }
    while let Some(Ok(msg)) = socket.recv().await {
        let WsMessage::Text(text) = msg else { continue };
        let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else {
            continue;
        };
        let reply = match frame["type"].as_str() {
            Some("ping") => json!({"type": "pong"}),
            Some("chat") if frame["message"] == "ping test" => {
                json!({"type": "message", "message": "pong back"})
            }
            Some("chat") => json!({
                "type": "message",
                "message": format!("echo: {}", frame["message"].as_str().unwrap_or_default()),
                "metadata": {"intent": "echo"}
            }),
            Some("clear_history") => json!({"type": "history_cleared"}),
            Some("chat_history") => json!({"type": "chat_history", "history": [
                {"role": "assistant", "content": "Welcome! How can I help?"},
                {"role": "assistant", "content": "Welcome! How can I help?"},
                {"role": "user", "content": "real msg"}
            ]}),
            _ => continue,
        };
        if !send_json(&mut socket, reply).await {
            break;
        }
    }
}

async fn chat(ws: WebSocketUpgrade, State(backend): State<Backend>) -> Response {
    let _ = backend.connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(chat_session)
}

/// Drops the first connection with 1011 right after the greeting.
async fn flaky(ws: WebSocketUpgrade, State(backend): State<Backend>) -> Response {
    let n = backend.connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(move |mut socket| async move {
        if n == 0 {
            let welcome = json!({"type": "welcome", "message": "Hi", "session_id": "abc"});
            let _ = send_json(&mut socket, welcome).await;
            let frame = CloseFrame {
                code: 1011,
                reason: "restarting".into(),
            };
            let _ = socket.send(WsMessage::Close(Some(frame))).await;
            while let Some(Ok(_)) = socket.recv().await {}
        } else {
            chat_session(socket).await;
        }
    })
}

async fn expired(ws: WebSocketUpgrade, State(backend): State<Backend>) -> Response {
    let _ = backend.connections.fetch_add(1, Ordering::SeqCst);
    ws.on_upgrade(|mut socket| async move {
        let frame = CloseFrame {
            code: 4001,
            reason: "token expired".into(),
        };
        let _ = socket.send(WsMessage::Close(Some(frame))).await;
        while let Some(Ok(_)) = socket.recv().await {}
    })
}

fn config(addr: SocketAddr, path: &str) -> ChatConfig {
    ChatConfig {
        endpoint_url: format!("ws://{addr}{path}"),
        reconnect: ReconnectPolicy {
            base_delay_ms: 10,
            max_attempts: 3,
        },
        ..ChatConfig::default()
    }
}

async fn eventually(client: &ChatClient, what: &str, check: impl Fn(&ConversationState) -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !check(&client.snapshot()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}: {:?}", client.snapshot());
}

fn greetings(state: &ConversationState) -> usize {
    state
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .count()
}

#[tokio::test]
async fn welcome_send_and_reply() {
    let (addr, _backend) = spawn_backend().await;
    let client = ChatClient::new(config(addr, "/chat"), Arc::new(NoopObserver));

    eventually(&client, "welcome", |s| s.session_id.is_some() && !s.messages.is_empty()).await;
    assert!(client.is_connected());
    assert_eq!(client.session_id().as_deref(), Some("abc"));
    assert_eq!(greetings(&client.snapshot()), 1);

    let sent = client.send_message("ping test", SendOptions::default()).unwrap();
    assert_eq!(sent.status, MessageStatus::Sent);

    eventually(&client, "reply", |s| s.messages.len() == 3).await;
    let messages = client.messages();
    assert_eq!(messages[1].content, "ping test");
    assert_eq!(messages[1].status, MessageStatus::Sent);
    assert_eq!(messages[2].content, "pong back");
    assert_eq!(messages[2].status, MessageStatus::Delivered);
    assert!(!client.is_typing());

    let _ = client.send_message("where is my order", SendOptions::default()).unwrap();
    eventually(&client, "echo", |s| s.messages.len() == 5).await;
    assert_eq!(client.messages_by_intent("echo").len(), 1);
    client.disconnect();
}

#[tokio::test]
async fn history_commands_round_trip() {
    let (addr, _backend) = spawn_backend().await;
    let client = ChatClient::new(config(addr, "/chat"), Arc::new(NoopObserver));
    eventually(&client, "connect", |s| s.is_connected && !s.messages.is_empty()).await;

    client.request_history().unwrap();
    eventually(&client, "history", |s| {
        s.messages.iter().any(|m| m.content == "real msg")
    })
    .await;
    let contents: Vec<_> = client.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, ["Welcome! How can I help?", "real msg"]);

    client.clear_history().unwrap();
    eventually(&client, "cleared", |s| {
        s.messages.len() == 1 && s.messages[0].content == parley_chat::HISTORY_CLEARED_NOTICE
    })
    .await;
    client.disconnect();
}

#[tokio::test]
async fn reconnect_does_not_repeat_greeting() {
    let (addr, backend) = spawn_backend().await;
    let client = ChatClient::new(config(addr, "/flaky"), Arc::new(NoopObserver));

    eventually(&client, "second connection", |s| s.is_connected).await;
    let reconnected = tokio::time::timeout(Duration::from_secs(5), async {
        while backend.connections.load(Ordering::SeqCst) < 2 || !client.is_connected() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reconnected.is_ok());

    // Second welcome arrives after the reconnect.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(greetings(&client.snapshot()), 1);
    assert_eq!(client.session_id().as_deref(), Some("abc"));
    client.disconnect();
}

#[derive(Default)]
struct AuthWatcher {
    fired: AtomicBool,
}

impl ChatObserver for AuthWatcher {
    fn on_auth_error(&self, _reason: &str) {
        self.fired.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn expired_token_stops_reconnecting() {
    let (addr, backend) = spawn_backend().await;
    let watcher = Arc::new(AuthWatcher::default());
    let client = ChatClient::new(config(addr, "/expired"), watcher.clone());

    eventually(&client, "auth failure", |s| {
        s.connection_status == ConnectionStatus::Error
    })
    .await;
    assert_eq!(client.error().as_deref(), Some(AUTH_REQUIRED_MESSAGE));
    assert!(watcher.fired.load(Ordering::SeqCst));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn manual_connect_when_auto_connect_is_off() {
    let (addr, backend) = spawn_backend().await;
    let client = ChatClient::new(
        ChatConfig {
            auto_connect: false,
            ..config(addr, "/chat")
        },
        Arc::new(NoopObserver),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.connections.load(Ordering::SeqCst), 0);
    assert_eq!(client.connection_status(), ConnectionStatus::Disconnected);

    client.connect();
    eventually(&client, "connect", |s| s.is_connected).await;
    client.disconnect();
    eventually(&client, "disconnect", |s| !s.is_connected).await;
    assert_eq!(client.connection_status(), ConnectionStatus::Disconnected);
}
