//! Greeting detection and deduplication.
//!
//! The server sends a `welcome` after every (re)connect and may also include
//! greetings in a history replay. Locally created greetings carry
//! `metadata.kind = "welcome"`; entries from the server are matched on
//! greeting phrasing instead.

use parley_core::messages::KIND_KEY;
use parley_core::{Message, Metadata, Role};
use serde_json::Value;

/// Value of `metadata.kind` on greetings.
pub const WELCOME_KIND: &str = "welcome";

const GREETING_MARKERS: &[&str] = &["welcome", "how can i help", "how may i help"];

/// Whether `message` is a greeting.
pub fn looks_like_welcome(message: &Message) -> bool {
    if message.metadata_str(KIND_KEY) == Some(WELCOME_KIND) {
        return true;
    }
    if message.role == Role::User {
        return false;
    }
    let content = message.content.to_lowercase();
    GREETING_MARKERS.iter().any(|marker| content.contains(marker))
}

/// A system greeting tagged as a welcome.
pub fn welcome_message(text: impl Into<String>) -> Message {
    let mut metadata = Metadata::new();
    let _ = metadata.insert(KIND_KEY.into(), Value::String(WELCOME_KIND.into()));
    Message::inbound(Role::System, text).with_metadata(metadata)
}

/// Drop every greeting except the last one, keeping everything else in order.
pub fn dedupe_welcomes(messages: Vec<Message>) -> Vec<Message> {
    let Some(keep) = messages.iter().rposition(looks_like_welcome) else {
        return messages;
    };
    messages
        .into_iter()
        .enumerate()
        .filter(|(i, m)| *i == keep || !looks_like_welcome(m))
        .map(|(_, m)| m)
        .collect()
}
