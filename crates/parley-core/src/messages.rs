//! Conversation entry types.
//!
//! A [`Message`] is one entry in the conversation log. Outbound entries are
//! created locally in [`MessageStatus::Sending`]; inbound entries are created
//! directly in [`MessageStatus::Delivered`].
//!
//! Status only moves forward along `sending → sent → delivered` or
//! `sending → error`. Once delivered or errored a message is immutable except
//! for deletion; [`MessageStatus::can_transition_to`] is the single source of
//! truth for that rule.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::MessageId;

/// Open key-value bag attached to a message (session id, intent, files, ...).
///
/// Unknown keys are preserved verbatim.
pub type Metadata = Map<String, Value>;

/// Metadata key carrying the intent classification of a message.
pub const INTENT_KEY: &str = "intent";
/// Metadata key carrying the local kind tag (e.g. `"welcome"`).
pub const KIND_KEY: &str = "kind";
/// Metadata key carrying file attachments.
pub const FILES_KEY: &str = "files";

/// Author of a conversation entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The local user.
    User,
    /// The remote assistant.
    Assistant,
    /// Client or server notices.
    System,
}

impl Role {
    /// Parse a role string from the wire, falling back to `fallback` for
    /// anything unrecognized.
    #[must_use]
    pub fn from_wire(value: &str, fallback: Role) -> Role {
        match value.to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => fallback,
        }
    }

    /// Wire string for this role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery lifecycle of a conversation entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Created locally, not yet handed to the transport.
    Sending,
    /// Handed to the transport.
    Sent,
    /// Received from, or confirmed by, the server.
    Delivered,
    /// Failed to send, or failed by a server error while in flight.
    Error,
}

impl MessageStatus {
    /// Whether no further status change is allowed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Error)
    }

    /// Whether moving from `self` to `next` respects the forward-only lifecycle.
    ///
    /// Re-asserting the current non-terminal status is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        match (self, next) {
            (Self::Sending, _) => true,
            (Self::Sent, Self::Sent | Self::Delivered) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// One conversation entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique entry ID.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Text body.
    pub content: String,
    /// Local creation time.
    pub timestamp: DateTime<Utc>,
    /// Delivery lifecycle.
    pub status: MessageStatus,
    /// Open metadata bag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Message {
    /// A locally authored user message, in `sending` status.
    #[must_use]
    pub fn outbound(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            status: MessageStatus::Sending,
            metadata: None,
        }
    }

    /// An entry received from (or synthesized for) the remote side, in
    /// `delivered` status.
    #[must_use]
    pub fn inbound(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            status: MessageStatus::Delivered,
            metadata: None,
        }
    }

    /// Attach metadata, dropping it entirely when empty.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = (!metadata.is_empty()).then_some(metadata);
        self
    }

    /// Override the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Look up a metadata value.
    #[must_use]
    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.as_ref()?.get(key)
    }

    /// Look up a string metadata value.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata_value(key)?.as_str()
    }

    /// Intent classification, if the server attached one.
    #[must_use]
    pub fn intent(&self) -> Option<&str> {
        self.metadata_str(INTENT_KEY)
    }
}
