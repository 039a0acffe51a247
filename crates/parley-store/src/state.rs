//! Conversation snapshot and read-only queries over it.

use chrono::{DateTime, Utc};
use parley_core::{ConnectionStatus, Message, MessageId, MessageStatus, Role, SessionId};
use serde::Serialize;

/// Everything the UI needs to render a conversation.
///
/// `messages` is in insertion order, which is the order events were
/// processed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    /// Conversation log.
    pub messages: Vec<Message>,
    /// Whether the socket is open.
    pub is_connected: bool,
    /// Waiting for a reply.
    pub is_loading: bool,
    /// Assistant is composing.
    pub is_typing: bool,
    /// Last surfaced error.
    pub error: Option<String>,
    /// Server-issued session id.
    pub session_id: Option<SessionId>,
    /// Connection lifecycle.
    pub connection_status: ConnectionStatus,
    /// Most recent inbound or outbound traffic.
    pub last_activity: Option<DateTime<Utc>>,
}

impl ConversationState {
    /// Entry with the given id.
    pub fn message(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// Entries authored by `role`, in log order.
    pub fn messages_by_role(&self, role: Role) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.role == role).collect()
    }

    /// Entries currently in `status`, in log order.
    pub fn messages_by_status(&self, status: MessageStatus) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.status == status).collect()
    }

    /// Entries whose `metadata.intent` equals `intent`.
    pub fn messages_by_intent(&self, intent: &str) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| m.intent() == Some(intent))
            .collect()
    }

    /// Newest entry.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Newest entry authored by `role`.
    pub fn last_message_by_role(&self, role: Role) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == role)
    }
}

#[cfg(test)]
mod tests {
    use parley_core::messages::INTENT_KEY;
    use serde_json::{Map, json};

    use super::*;

    fn with_intent(role: Role, content: &str, intent: &str) -> Message {
        let mut metadata = Map::new();
        let _ = metadata.insert(INTENT_KEY.into(), json!(intent));
        Message::inbound(role, content).with_metadata(metadata)
    }

    fn sample() -> ConversationState {
        ConversationState {
            messages: vec![
                Message::inbound(Role::System, "Welcome"),
                Message::outbound("hi"),
                with_intent(Role::Assistant, "hello", "greeting"),
                Message::outbound("order status?"),
                with_intent(Role::Assistant, "on its way", "order_status"),
            ],
            ..ConversationState::default()
        }
    }

    #[test]
    fn default_state() {
        let state = ConversationState::default();
        assert!(state.messages.is_empty());
        assert!(!state.is_connected);
        assert_eq!(state.connection_status, ConnectionStatus::Disconnected);
        assert!(state.session_id.is_none());
        assert!(state.last_message().is_none());
    }

    #[test]
    fn lookup_by_id() {
        let state = sample();
        let id = state.messages[2].id.clone();
        assert_eq!(state.message(&id).map(|m| m.content.as_str()), Some("hello"));
        assert!(state.message(&MessageId::from("missing")).is_none());
    }

    #[test]
    fn filter_by_role_and_status() {
        let state = sample();
        let users: Vec<_> = state
            .messages_by_role(Role::User)
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(users, ["hi", "order status?"]);
        assert_eq!(state.messages_by_status(MessageStatus::Sending).len(), 2);
        assert_eq!(state.messages_by_status(MessageStatus::Delivered).len(), 3);
    }

    #[test]
    fn filter_by_intent() {
        let state = sample();
        let hits = state.messages_by_intent("order_status");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "on its way");
        assert!(state.messages_by_intent("refund").is_empty());
    }

    #[test]
    fn last_by_role() {
        let state = sample();
        assert_eq!(state.last_message().map(|m| m.content.as_str()), Some("on its way"));
        assert_eq!(
            state
                .last_message_by_role(Role::User)
                .map(|m| m.content.as_str()),
            Some("order status?")
        );
        assert_eq!(
            state
                .last_message_by_role(Role::System)
                .map(|m| m.content.as_str()),
            Some("Welcome")
        );
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(ConversationState::default()).unwrap();
        assert_eq!(value["isConnected"], json!(false));
        assert_eq!(value["connectionStatus"], json!("disconnected"));
        assert!(value["messages"].as_array().unwrap().is_empty());
    }
}
