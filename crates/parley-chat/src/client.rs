//! The chat client handle.
//!
//! [`ChatClient`] composes a [`Transport`] and a [`Store`]. Connection events
//! arrive on one channel and are applied in order by a single pump task;
//! user actions validate first, then mutate the store, then hand a frame to
//! the transport. No lock is held across a transport call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use parley_core::protocol::OutboundFrame;
use parley_core::{
    ChatError, ConnectionStatus, Message, MessageId, MessageStatus, Metadata, Result, Role,
    SessionId,
};
use parley_store::{Action, ConversationState, MessagePatch, Store};
use parley_transport::{ConnectionEvent, ConnectionManager};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::observer::ChatObserver;
use crate::transport::Transport;

/// Store error shown after the server rejects the credentials.
pub const AUTH_REQUIRED_MESSAGE: &str = "Authentication required. Please sign in again.";

/// Store error shown once manual retries are spent.
pub const RETRIES_EXHAUSTED_MESSAGE: &str =
    "Maximum retry attempts reached. Please refresh and try again.";

/// Extra data for [`ChatClient::send_message`].
#[derive(Clone, Debug, Default)]
pub struct SendOptions {
    /// Keys merged into the frame's `context` object.
    pub context: Metadata,
    /// Metadata stored on the local message.
    pub metadata: Metadata,
}

/// One turn of conversation context sent to the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContextTurn {
    /// Author.
    pub role: Role,
    /// Text body.
    pub content: String,
}

/// Handle to a chat session. Cheap to clone.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) config: ChatConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Store,
    pub(crate) pending: Mutex<HashMap<MessageId, Message>>,
    pub(crate) observer: Arc<dyn ChatObserver>,
    retry_count: AtomicU32,
}

impl ChatClient {
    /// Create a client backed by a [`ConnectionManager`] and start its event
    /// pump. Connects immediately when `config.auto_connect` is set.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ChatConfig, observer: Arc<dyn ChatObserver>) -> Self {
        let (manager, events) = ConnectionManager::new(config.connection_config());
        let auto_connect = config.auto_connect;
        let client = Self::with_transport(config, Arc::new(manager), observer);
        drop(client.listen(events));
        if auto_connect {
            client.connect();
        }
        client
    }

    /// Create a client over an arbitrary transport. No event pump is started;
    /// feed events with [`listen`](Self::listen) or
    /// [`apply_event`](Self::apply_event).
    pub fn with_transport(
        config: ChatConfig,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn ChatObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                store: Store::new(),
                pending: Mutex::new(HashMap::new()),
                observer,
                retry_count: AtomicU32::new(0),
            }),
        }
    }

    /// Spawn the task that applies `events` in order. The task holds only a
    /// weak reference and exits once the client is dropped or the channel
    /// closes.
    pub fn listen(&self, mut events: UnboundedReceiver<ConnectionEvent>) -> JoinHandle<()> {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.apply_event(event);
            }
            debug!("event pump stopped");
        })
    }

    /// Apply one connection event.
    pub fn apply_event(&self, event: ConnectionEvent) {
        self.inner.apply_event(event);
    }

    // ── State ──────────────────────────────────────────────────────────

    /// Current conversation snapshot.
    pub fn snapshot(&self) -> Arc<ConversationState> {
        self.inner.store.snapshot()
    }

    /// Conversation log.
    pub fn messages(&self) -> Vec<Message> {
        self.snapshot().messages.clone()
    }

    /// Whether the socket is open, as last reported to the store.
    pub fn is_connected(&self) -> bool {
        self.snapshot().is_connected
    }

    /// Waiting for a reply.
    pub fn is_loading(&self) -> bool {
        self.snapshot().is_loading
    }

    /// Assistant is composing.
    pub fn is_typing(&self) -> bool {
        self.snapshot().is_typing
    }

    /// Last surfaced error.
    pub fn error(&self) -> Option<String> {
        self.snapshot().error.clone()
    }

    /// Server-issued session id.
    pub fn session_id(&self) -> Option<SessionId> {
        self.snapshot().session_id.clone()
    }

    /// Connection lifecycle.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.snapshot().connection_status
    }

    /// Outbound messages not yet handed to the transport.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Manual retries since the last successful connect.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::SeqCst)
    }

    // ── Queries ────────────────────────────────────────────────────────

    /// Entry with the given id.
    pub fn message_by_id(&self, id: &MessageId) -> Option<Message> {
        self.snapshot().message(id).cloned()
    }

    /// Entries tagged with `metadata.intent == intent`.
    pub fn messages_by_intent(&self, intent: &str) -> Vec<Message> {
        self.snapshot()
            .messages_by_intent(intent)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The last `limit` user and assistant turns, oldest first.
    pub fn conversation_context(&self, limit: usize) -> Vec<ContextTurn> {
        conversation_context(&self.snapshot(), limit)
    }

    // ── Actions ────────────────────────────────────────────────────────

    /// Start connecting.
    pub fn connect(&self) {
        self.inner.transport.connect();
    }

    /// Close the connection and stop reconnecting.
    pub fn disconnect(&self) {
        self.inner.transport.disconnect();
    }

    /// Send a user message.
    ///
    /// Returns the stored message: `sent` once the transport accepted it, or
    /// `error` if a server error frame arrived while it was in flight.
    pub fn send_message(&self, text: &str, options: SendOptions) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::Validation("message cannot be empty".into()));
        }
        if !self.inner.transport.is_connected() {
            return Err(ChatError::NotConnected);
        }

        let snapshot = self.snapshot();
        let context = build_context(&snapshot, &self.inner.config, options.context);
        let message = Message::outbound(text).with_metadata(options.metadata);
        let id = message.id.clone();

        // A server error drains the table from the pump task. The entry must be
        // in the store, with loading set, before it becomes drainable.
        {
            let mut pending = self.inner.pending.lock();
            let _ = self.inner.store.dispatch(Action::AddMessage(message.clone()));
            let _ = self.inner.store.dispatch(Action::SetLoading(true));
            let _ = self.inner.store.dispatch(Action::SetTyping(true));
            let _ = pending.insert(id.clone(), message.clone());
        }

        let frame = OutboundFrame::Chat {
            message: text.to_owned(),
            echo: false,
            context,
        };
        let sent = serde_json::to_value(&frame)
            .is_ok_and(|value| self.inner.transport.send_json(&value));
        let still_pending = self.inner.pending.lock().remove(&id).is_some();

        if sent {
            if still_pending {
                let _ = self.inner.store.dispatch(Action::UpdateMessage {
                    id: id.clone(),
                    patch: MessagePatch::status(MessageStatus::Sent),
                });
            }
            let _ = self
                .inner
                .store
                .dispatch(Action::TouchLastActivity(Utc::now()));
            debug!(message_id = %id, "message handed to transport");
            Ok(self.message_by_id(&id).unwrap_or(message))
        } else {
            warn!(message_id = %id, "transport refused message");
            let _ = self.inner.store.dispatch(Action::UpdateMessage {
                id,
                patch: MessagePatch::status(MessageStatus::Error),
            });
            let _ = self.inner.store.dispatch(Action::SetLoading(false));
            let _ = self.inner.store.dispatch(Action::SetTyping(false));
            Err(ChatError::SendFailed { what: "message" })
        }
    }

    /// Ask the server to drop the conversation history.
    pub fn clear_history(&self) -> Result<()> {
        self.send_control(&OutboundFrame::ClearHistory, "clear_history")
    }

    /// Ask the server to replay the conversation history.
    pub fn request_history(&self) -> Result<()> {
        self.send_control(&OutboundFrame::ChatHistory, "chat_history")
    }

    /// Drop the connection and reconnect after `retry_delay * attempt`.
    ///
    /// Fails with [`ChatError::RetriesExhausted`] once more than
    /// `max_retries` retries were made since the last successful connect.
    pub async fn retry(&self) -> Result<()> {
        let attempt = self.inner.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.inner.config.max_retries {
            warn!(attempt, max = self.inner.config.max_retries, "retry budget spent");
            let _ = self
                .inner
                .store
                .dispatch(Action::SetError(Some(RETRIES_EXHAUSTED_MESSAGE.into())));
            return Err(ChatError::RetriesExhausted { attempts: attempt });
        }

        let delay = self.inner.config.retry_delay.saturating_mul(attempt);
        info!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying connection"
        );
        tokio::time::sleep(delay).await;
        self.inner.transport.disconnect();
        self.inner.transport.connect();
        Ok(())
    }

    fn send_control(&self, frame: &OutboundFrame, what: &'static str) -> Result<()> {
        if !self.inner.transport.is_connected() {
            return Err(ChatError::NotConnected);
        }
        let sent =
            serde_json::to_value(frame).is_ok_and(|value| self.inner.transport.send_json(&value));
        if sent {
            debug!(what, "control frame sent");
            Ok(())
        } else {
            Err(ChatError::SendFailed { what })
        }
    }
}

impl Inner {
    pub(crate) fn dispatch(&self, action: Action) {
        let _ = self.store.dispatch(action);
    }

    fn apply_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::StatusChanged(status) => {
                self.dispatch(Action::SetConnectionStatus(status));
            }
            ConnectionEvent::Connected => {
                self.retry_count.store(0, Ordering::SeqCst);
                self.dispatch(Action::SetConnected(true));
                self.dispatch(Action::SetError(None));
                self.observer.on_connection_change(true);
            }
            ConnectionEvent::Disconnected { code, reason } => {
                debug!(code, %reason, "disconnected");
                self.dispatch(Action::SetConnected(false));
                self.observer.on_connection_change(false);
            }
            ConnectionEvent::Message(value) => self.handle_frame(value),
            ConnectionEvent::Error(err) => {
                let text = err.to_string();
                self.dispatch(Action::SetError(Some(text.clone())));
                self.observer.on_error(&text);
            }
            ConnectionEvent::AuthFailed { reason } => {
                warn!(%reason, "authentication failed");
                self.dispatch(Action::SetError(Some(AUTH_REQUIRED_MESSAGE.into())));
                self.dispatch(Action::SetConnectionStatus(ConnectionStatus::Error));
                self.observer.on_auth_error(&reason);
            }
            ConnectionEvent::ReconnectScheduled { attempt, delay } => {
                debug!(attempt, ?delay, "reconnect scheduled");
            }
        }
    }
}

/// The last `limit` user/assistant turns that did not fail, oldest first.
pub(crate) fn conversation_context(state: &ConversationState, limit: usize) -> Vec<ContextTurn> {
    let mut turns: Vec<ContextTurn> = state
        .messages
        .iter()
        .rev()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .filter(|m| m.status != MessageStatus::Error)
        .take(limit)
        .map(|m| ContextTurn {
            role: m.role,
            content: m.content.clone(),
        })
        .collect();
    turns.reverse();
    turns
}

fn build_context(state: &ConversationState, config: &ChatConfig, extra: Metadata) -> Metadata {
    let mut context = Metadata::new();
    if let Some(session_id) = &state.session_id {
        let _ = context.insert("session_id".into(), Value::String(session_id.to_string()));
    }
    let history = conversation_context(state, config.context_window);
    if let Ok(history) = serde_json::to_value(history) {
        let _ = context.insert("conversation_history".into(), history);
    }
    context.extend(extra);
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(messages: Vec<Message>) -> ConversationState {
        ConversationState {
            messages,
            ..ConversationState::default()
        }
    }

    #[test]
    fn context_takes_recent_turns_in_order() {
        let mut failed = Message::outbound("lost");
        failed.status = MessageStatus::Error;
        let state = state_with(vec![
            Message::inbound(Role::System, "Welcome"),
            Message::outbound("one"),
            Message::inbound(Role::Assistant, "two"),
            failed,
            Message::outbound("three"),
        ]);
        let turns = conversation_context(&state, 2);
        assert_eq!(
            turns,
            vec![
                ContextTurn {
                    role: Role::Assistant,
                    content: "two".into()
                },
                ContextTurn {
                    role: Role::User,
                    content: "three".into()
                },
            ]
        );
        assert!(conversation_context(&state, 0).is_empty());
    }

    #[test]
    fn context_object_shape() {
        let mut state = state_with(vec![Message::outbound("hi")]);
        state.session_id = Some(SessionId::from("abc"));
        let mut extra = Metadata::new();
        let _ = extra.insert("page".into(), Value::String("checkout".into()));

        let context = build_context(&state, &ChatConfig::default(), extra);
        assert_eq!(context["session_id"], "abc");
        assert_eq!(context["page"], "checkout");
        assert_eq!(
            context["conversation_history"],
            serde_json::json!([{"role": "user", "content": "hi"}])
        );
    }

    #[test]
    fn context_without_session() {
        let context = build_context(
            &ConversationState::default(),
            &ChatConfig::default(),
            Metadata::new(),
        );
        assert!(!context.contains_key("session_id"));
        assert_eq!(context["conversation_history"], serde_json::json!([]));
    }
}
