//! JSON wire protocol spoken over the chat WebSocket.
//!
//! Every frame is a JSON object discriminated by its `type` field.
//! [`OutboundFrame`] covers what the client sends, [`InboundFrame`] what the
//! server sends. Inbound frames with an unrecognized `type` decode to
//! [`InboundFrame::Unknown`] so new server message kinds never break the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::Metadata;

/// Close codes with reserved meaning.
pub mod close_code {
    /// Normal closure, also used for manual disconnects.
    pub const NORMAL: u16 = 1000;
    /// No status code was present in the close frame.
    pub const NO_STATUS: u16 = 1005;
    /// The connection dropped without a close frame.
    pub const ABNORMAL: u16 = 1006;
    /// The server rejected the credentials. Never auto-retried.
    pub const AUTH_REQUIRED: u16 = 4001;
}

/// Frames sent by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A user chat turn.
    Chat {
        /// Text body.
        message: String,
        /// Whether the server should echo the message back as `user_message`.
        echo: bool,
        /// Conversation context for the server.
        context: Metadata,
    },
    /// Ask the server to drop the conversation history.
    ClearHistory,
    /// Ask the server to replay the conversation history.
    ChatHistory,
    /// Heartbeat.
    Ping,
}

/// One entry of a `chat_history` replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Author role as sent by the server.
    pub role: String,
    /// Text body.
    #[serde(default)]
    pub content: String,
    /// Creation time as sent by the server (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Server metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Frames received from the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// Session greeting, sent after every (re)connect.
    Welcome {
        /// Greeting text.
        #[serde(default)]
        message: String,
        /// Server-issued session identifier.
        session_id: String,
    },
    /// A completed assistant turn.
    Message {
        /// Text body.
        message: String,
        /// Optional role override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        /// Server metadata (intent, sources, ...).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
        /// Server timestamp (RFC 3339).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    /// Server echo of our own message.
    UserMessage {
        /// Echoed text, unused.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Server-side failure for the current turn.
    Error {
        /// Human-readable error text.
        #[serde(default)]
        message: String,
    },
    /// Full history replay.
    ChatHistory {
        /// Entries in chronological order.
        #[serde(default)]
        history: Vec<HistoryEntry>,
    },
    /// Confirmation that the server dropped the history.
    HistoryCleared {
        /// Optional confirmation text.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Assistant turn carrying file attachments.
    FileMessage {
        /// Text body.
        #[serde(default)]
        message: String,
        /// Attached file descriptors, passed through untouched.
        #[serde(default)]
        files: Vec<Value>,
        /// Server metadata.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    /// Metadata about the previous response, logged only.
    ResponseMetadata {
        /// Metadata payload.
        #[serde(default)]
        metadata: Metadata,
    },
    /// Heartbeat reply.
    Pong {},
    /// Any `type` this client does not know about.
    #[serde(other)]
    Unknown,
}

/// The raw `type` discriminator of a decoded frame, if present.
pub fn frame_type(value: &Value) -> Option<&str> {
    value.get("type")?.as_str()
}

/// Parse an RFC 3339 timestamp from the wire.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
