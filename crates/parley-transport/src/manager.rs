//! Connection manager handle and its supervising task.
//!
//! `connect()` spawns one supervisor per connection generation. The
//! supervisor opens the socket, runs it until close, then either reports an
//! auth failure, reconnects with exponential backoff, or gives up once the
//! attempt budget is spent. `disconnect()` bumps the generation and cancels
//! the supervisor, so anything a superseded supervisor would still write is
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use parley_core::protocol::{close_code, frame_type};
use parley_core::{ConnectionId, ConnectionStatus};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::ConnectionConfig;
use crate::error::TransportError;
use crate::events::{CloseDisposition, ConnectionEvent, classify_close};
use crate::session::{self, SessionEnd};

/// Reconnecting WebSocket client.
///
/// Every observable change is reported on the event receiver returned by
/// [`ConnectionManager::new`]. Dropping the manager cancels any live socket
/// and pending reconnect.
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    config: ConnectionConfig,
    connection_id: ConnectionId,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: Mutex<State>,
}

struct State {
    status: ConnectionStatus,
    outbound: Option<mpsc::Sender<Message>>,
    cancel: Option<CancellationToken>,
    reconnect_attempts: u32,
    manual_disconnect: bool,
    last_error: Option<String>,
    last_activity: Option<DateTime<Utc>>,
    generation: u64,
}

impl ConnectionManager {
    /// Create a disconnected manager and the receiver for its events.
    pub fn new(config: ConnectionConfig) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            config,
            connection_id: ConnectionId::new(),
            events,
            state: Mutex::new(State {
                status: ConnectionStatus::Disconnected,
                outbound: None,
                cancel: None,
                reconnect_attempts: 0,
                manual_disconnect: false,
                last_error: None,
                last_activity: None,
                generation: 0,
            }),
        });
        (Self { inner }, rx)
    }

    /// Open the connection. No-op while already connected or connecting.
    ///
    /// Must be called from within a Tokio runtime; otherwise the attempt is
    /// reported as an open error.
    pub fn connect(&self) {
        let mut state = self.inner.state.lock();
        if matches!(
            state.status,
            ConnectionStatus::Connected | ConnectionStatus::Connecting
        ) {
            debug!(status = %state.status, "connect ignored");
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let err = TransportError::Open {
                url: self.inner.config.url.clone(),
                reason: "no async runtime".into(),
            };
            state.last_error = Some(err.to_string());
            self.inner.emit(ConnectionEvent::Error(err));
            self.inner.set_status(&mut state, ConnectionStatus::Error);
            return;
        };

        state.generation += 1;
        state.manual_disconnect = false;
        state.reconnect_attempts = 0;
        state.last_error = None;
        let cancel = CancellationToken::new();
        state.cancel = Some(cancel.clone());
        let generation = state.generation;
        self.inner.set_status(&mut state, ConnectionStatus::Connecting);
        drop(state);

        drop(runtime.spawn(supervise(Arc::clone(&self.inner), generation, cancel)));
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Synchronous: once this returns no reconnect or heartbeat will fire
    /// for the previous connection.
    pub fn disconnect(&self) {
        let mut state = self.inner.state.lock();
        state.manual_disconnect = true;
        state.generation += 1;
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        state.outbound = None;
        state.reconnect_attempts = 0;

        if state.status != ConnectionStatus::Disconnected {
            self.inner.set_status(&mut state, ConnectionStatus::Disconnected);
            self.inner.emit(ConnectionEvent::Disconnected {
                code: close_code::NORMAL,
                reason: "manual disconnect".into(),
            });
            info!(connection_id = %self.inner.connection_id, "disconnected");
        }
    }

    /// Queue a raw text frame. Returns `false` unless connected and the
    /// frame was accepted by the outbound queue.
    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        let sender = {
            let state = self.inner.state.lock();
            if state.status == ConnectionStatus::Connected {
                state.outbound.clone()
            } else {
                None
            }
        };
        let Some(sender) = sender else {
            warn!("send while not connected");
            return false;
        };

        match sender.try_send(Message::Text(text.into().into())) {
            Ok(()) => {
                self.inner.state.lock().last_activity = Some(Utc::now());
                true
            }
            Err(e) => {
                let err = TransportError::Send(e.to_string());
                warn!(error = %err, "outbound queue rejected frame");
                self.inner.state.lock().last_error = Some(err.to_string());
                self.inner.emit(ConnectionEvent::Error(err));
                false
            }
        }
    }

    /// Serialize `message` to JSON and queue it.
    pub fn send_message<T: Serialize + ?Sized>(&self, message: &T) -> bool {
        match serde_json::to_string(message) {
            Ok(text) => self.send_raw(text),
            Err(e) => {
                self.inner
                    .emit(ConnectionEvent::Error(TransportError::Send(e.to_string())));
                false
            }
        }
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().status
    }

    /// Whether the socket is open.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Reconnect attempts scheduled since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.state.lock().reconnect_attempts
    }

    /// Whether the last close was requested through [`disconnect`](Self::disconnect).
    pub fn is_manually_disconnected(&self) -> bool {
        self.inner.state.lock().manual_disconnect
    }

    /// Most recent failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.lock().last_error.clone()
    }

    /// Time of the last frame sent or received.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_activity
    }

    /// Identifier used in this manager's log spans.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.inner.connection_id
    }

    /// Configured endpoint.
    pub fn url(&self) -> &str {
        &self.inner.config.url
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(cancel) = self.inner.state.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

impl Inner {
    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    fn set_status(&self, state: &mut State, status: ConnectionStatus) {
        if state.status != status {
            state.status = status;
            self.emit(ConnectionEvent::StatusChanged(status));
        }
    }

    /// Decode an inbound text frame. `pong` frames are consumed here.
    pub(crate) fn handle_text(&self, generation: u64, text: &str) {
        {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.last_activity = Some(Utc::now());
        }

        match serde_json::from_str::<Value>(text) {
            Ok(value) if frame_type(&value) == Some("pong") => trace!("pong received"),
            Ok(value) => self.emit(ConnectionEvent::Message(value)),
            Err(e) => {
                warn!(error = %e, "malformed inbound frame");
                self.emit(ConnectionEvent::Error(TransportError::Parse(e.to_string())));
            }
        }
    }

    pub(crate) fn report_send_failure(&self, generation: u64, reason: &str) {
        let mut state = self.state.lock();
        if state.generation == generation {
            let err = TransportError::Send(reason.to_owned());
            state.last_error = Some(err.to_string());
            self.emit(ConnectionEvent::Error(err));
        }
    }

    /// Schedule the next reconnect, or give up. Returns the delay to wait.
    fn next_reconnect(&self, state: &mut State) -> Option<Duration> {
        if let Some(delay) = self.config.reconnect.next_delay(state.reconnect_attempts) {
            state.reconnect_attempts += 1;
            info!(
                attempt = state.reconnect_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnect scheduled"
            );
            self.emit(ConnectionEvent::ReconnectScheduled {
                attempt: state.reconnect_attempts,
                delay,
            });
            Some(delay)
        } else {
            warn!(attempts = state.reconnect_attempts, "reconnect attempts exhausted");
            self.emit(ConnectionEvent::Error(TransportError::ReconnectExhausted {
                attempts: state.reconnect_attempts,
                last_error: state.last_error.clone(),
            }));
            self.set_status(state, ConnectionStatus::Error);
            None
        }
    }
}

#[instrument(
    skip_all,
    fields(connection_id = %inner.connection_id, url = %inner.config.url, generation = generation)
)]
async fn supervise(inner: Arc<Inner>, generation: u64, cancel: CancellationToken) {
    loop {
        let opened = tokio::select! {
            () = cancel.cancelled() => return,
            result = session::open(&inner.config.url, inner.config.auth_token.as_deref()) => result,
        };

        let delay = match opened {
            Ok(socket) => {
                let (tx, mut rx) = mpsc::channel(inner.config.outbound_buffer.max(1));
                {
                    let mut state = inner.state.lock();
                    if state.generation != generation {
                        return;
                    }
                    state.outbound = Some(tx);
                    state.reconnect_attempts = 0;
                    state.last_activity = Some(Utc::now());
                    inner.set_status(&mut state, ConnectionStatus::Connected);
                    inner.emit(ConnectionEvent::Connected);
                }
                info!("connected");

                let end = session::run(
                    socket,
                    &inner,
                    generation,
                    &mut rx,
                    &cancel,
                    inner.config.heartbeat_interval,
                )
                .await;

                let mut state = inner.state.lock();
                if state.generation != generation || cancel.is_cancelled() {
                    return;
                }
                state.outbound = None;
                match on_close(&inner, &mut state, end) {
                    Some(delay) => delay,
                    None => return,
                }
            }
            Err(err) => {
                let mut state = inner.state.lock();
                if state.generation != generation {
                    return;
                }
                match on_open_failure(&inner, &mut state, err) {
                    Some(delay) => delay,
                    None => return,
                }
            }
        };

        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        let mut state = inner.state.lock();
        if state.generation != generation {
            return;
        }
        inner.set_status(&mut state, ConnectionStatus::Connecting);
    }
}

fn on_close(inner: &Inner, state: &mut State, end: SessionEnd) -> Option<Duration> {
    match classify_close(end.code) {
        CloseDisposition::AuthRequired => {
            warn!(code = end.code, reason = %end.reason, "authentication required");
            state.last_error = Some(TransportError::Unauthorized(end.reason.clone()).to_string());
            inner.set_status(state, ConnectionStatus::Error);
            inner.emit(ConnectionEvent::AuthFailed { reason: end.reason });
            None
        }
        CloseDisposition::Reconnect => {
            info!(code = end.code, reason = %end.reason, "connection closed");
            state.last_error = Some(format!("closed with code {}: {}", end.code, end.reason));
            inner.set_status(state, ConnectionStatus::Disconnected);
            inner.emit(ConnectionEvent::Disconnected {
                code: end.code,
                reason: end.reason,
            });
            inner.next_reconnect(state)
        }
    }
}

fn on_open_failure(
    inner: &Inner,
    state: &mut State,
    err: TransportError,
) -> Option<Duration> {
    state.last_error = Some(err.to_string());
    match err {
        TransportError::Unauthorized(reason) => {
            warn!(%reason, "upgrade rejected");
            inner.set_status(state, ConnectionStatus::Error);
            inner.emit(ConnectionEvent::AuthFailed { reason });
            None
        }
        err @ TransportError::InvalidRequest(_) => {
            warn!(error = %err, "invalid connection request");
            inner.emit(ConnectionEvent::Error(err));
            inner.set_status(state, ConnectionStatus::Error);
            None
        }
        err => {
            warn!(error = %err, "connect failed");
            inner.emit(ConnectionEvent::Error(err));
            inner.set_status(state, ConnectionStatus::Error);
            inner.next_reconnect(state)
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use parley_core::retry::ReconnectPolicy;

    use super::*;

    async fn unused_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}/ws")
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[test]
    fn starts_disconnected() {
        let (manager, _rx) = ConnectionManager::new(ConnectionConfig::new("ws://localhost/ws"));
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        assert!(!manager.is_connected());
        assert_eq!(manager.reconnect_attempts(), 0);
        assert!(manager.last_error().is_none());
        assert!(manager.last_activity().is_none());
    }

    #[test]
    fn send_while_disconnected_is_refused() {
        let (manager, mut rx) = ConnectionManager::new(ConnectionConfig::new("ws://localhost/ws"));
        assert!(!manager.send_raw("{}"));
        assert!(!manager.send_message(&serde_json::json!({"type": "ping"})));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disconnect_when_idle_emits_nothing() {
        let (manager, mut rx) = ConnectionManager::new(ConnectionConfig::new("ws://localhost/ws"));
        manager.disconnect();
        assert!(manager.is_manually_disconnected());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn connect_outside_runtime_reports_error() {
        let (manager, mut rx) = ConnectionManager::new(ConnectionConfig::new("ws://localhost/ws"));
        manager.connect();
        assert_matches!(
            rx.try_recv(),
            Ok(ConnectionEvent::Error(TransportError::Open { .. }))
        );
        assert_matches!(
            rx.try_recv(),
            Ok(ConnectionEvent::StatusChanged(ConnectionStatus::Error))
        );
        assert_eq!(manager.status(), ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn open_failure_without_budget_gives_up() {
        let config = ConnectionConfig::new(unused_url().await).with_reconnect(ReconnectPolicy {
            base_delay_ms: 10,
            max_attempts: 0,
        });
        let (manager, mut rx) = ConnectionManager::new(config);
        manager.connect();

        assert_eq!(
            next_event(&mut rx).await,
            ConnectionEvent::StatusChanged(ConnectionStatus::Connecting)
        );
        assert_matches!(
            next_event(&mut rx).await,
            ConnectionEvent::Error(TransportError::Open { .. })
        );
        assert_eq!(
            next_event(&mut rx).await,
            ConnectionEvent::StatusChanged(ConnectionStatus::Error)
        );
        assert_matches!(
            next_event(&mut rx).await,
            ConnectionEvent::Error(TransportError::ReconnectExhausted {
                attempts: 0,
                last_error: Some(_)
            })
        );
        assert_eq!(manager.status(), ConnectionStatus::Error);
    }

    #[tokio::test]
    async fn reconnect_delays_double_until_budget_spent() {
        let config = ConnectionConfig::new(unused_url().await).with_reconnect(ReconnectPolicy {
            base_delay_ms: 10,
            max_attempts: 3,
        });
        let (manager, mut rx) = ConnectionManager::new(config);
        manager.connect();

        let mut scheduled = Vec::new();
        loop {
            match next_event(&mut rx).await {
                ConnectionEvent::ReconnectScheduled { attempt, delay } => {
                    scheduled.push((attempt, delay));
                }
                ConnectionEvent::Error(TransportError::ReconnectExhausted { attempts, .. }) => {
                    assert_eq!(attempts, 3);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(
            scheduled,
            vec![
                (1, Duration::from_millis(10)),
                (2, Duration::from_millis(20)),
                (3, Duration::from_millis(40)),
            ]
        );
        assert_eq!(manager.reconnect_attempts(), 3);
    }

    #[tokio::test]
    async fn disconnect_cancels_pending_reconnect() {
        let config = ConnectionConfig::new(unused_url().await).with_reconnect(ReconnectPolicy {
            base_delay_ms: 60_000,
            max_attempts: 5,
        });
        let (manager, mut rx) = ConnectionManager::new(config);
        manager.connect();

        loop {
            if let ConnectionEvent::ReconnectScheduled { .. } = next_event(&mut rx).await {
                break;
            }
        }
        manager.disconnect();
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
        assert_eq!(manager.reconnect_attempts(), 0);

        while let Ok(event) = rx.try_recv() {
            assert!(
                !matches!(event, ConnectionEvent::ReconnectScheduled { .. }),
                "unexpected {event:?}"
            );
        }
    }

    #[tokio::test]
    async fn connect_while_connecting_is_noop() {
        let config = ConnectionConfig::new(unused_url().await).with_reconnect(ReconnectPolicy {
            base_delay_ms: 60_000,
            max_attempts: 0,
        });
        let (manager, mut rx) = ConnectionManager::new(config);
        manager.connect();
        manager.connect();
        assert_eq!(
            rx.try_recv().ok(),
            Some(ConnectionEvent::StatusChanged(ConnectionStatus::Connecting))
        );
        assert!(rx.try_recv().is_err());
    }
}
