//! Store actions.

use chrono::{DateTime, Utc};
use parley_core::{ConnectionStatus, Message, MessageId, MessageStatus, Metadata, SessionId};

/// A single state change.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Socket opened or closed.
    SetConnected(bool),
    /// Connection status changed.
    SetConnectionStatus(ConnectionStatus),
    /// Server-issued session id, or `None` to forget it.
    SetSessionId(Option<SessionId>),
    /// Waiting for a reply.
    SetLoading(bool),
    /// Assistant is composing.
    SetTyping(bool),
    /// Last surfaced error; `None` clears it.
    SetError(Option<String>),
    /// Append to the log.
    AddMessage(Message),
    /// Patch an existing entry.
    UpdateMessage {
        /// Target entry.
        id: MessageId,
        /// Fields to change.
        patch: MessagePatch,
    },
    /// Remove an entry.
    DeleteMessage(MessageId),
    /// Empty the log.
    ClearMessages,
    /// Replace the whole log.
    ReplaceMessages(Vec<Message>),
    /// Record traffic at the given instant.
    TouchLastActivity(DateTime<Utc>),
}

/// Partial update for a message. `None` fields are left alone; metadata keys
/// are merged into the existing map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessagePatch {
    /// New body.
    pub content: Option<String>,
    /// New status; must be a legal forward transition.
    pub status: Option<MessageStatus>,
    /// Keys to insert or overwrite.
    pub metadata: Option<Metadata>,
}

impl MessagePatch {
    /// Patch that only changes the status.
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that only changes the content.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.status.is_none() && self.metadata.is_none()
    }
}
