//! Translation of inbound frames into store actions.

use chrono::Utc;
use parley_core::messages::FILES_KEY;
use parley_core::protocol::{HistoryEntry, InboundFrame, frame_type, parse_timestamp};
use parley_core::{Message, MessageStatus, Role, SessionId};
use parley_store::{Action, MessagePatch};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::Inner;
use crate::welcome::{dedupe_welcomes, looks_like_welcome, welcome_message};

/// Notice appended after the server drops the history.
pub const HISTORY_CLEARED_NOTICE: &str = "Chat history cleared";

impl Inner {
    pub(crate) fn handle_frame(&self, value: Value) {
        self.dispatch(Action::TouchLastActivity(Utc::now()));

        let kind = frame_type(&value).unwrap_or_default().to_owned();
        let frame = match serde_json::from_value::<InboundFrame>(value) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = %kind, error = %e, "dropping undecodable frame");
                return;
            }
        };

        match frame {
            InboundFrame::Welcome {
                message,
                session_id,
            } => self.on_welcome(message, session_id),
            InboundFrame::Message {
                message,
                role,
                metadata,
                timestamp,
            } => {
                let role = role.map_or(Role::Assistant, |r| Role::from_wire(&r, Role::Assistant));
                let mut entry =
                    Message::inbound(role, message).with_metadata(metadata.unwrap_or_default());
                if let Some(at) = timestamp.as_deref().and_then(parse_timestamp) {
                    entry = entry.with_timestamp(at);
                }
                self.append_reply(entry);
            }
            InboundFrame::UserMessage { .. } => debug!("ignoring echoed user message"),
            InboundFrame::Error { message } => self.on_server_error(message),
            InboundFrame::ChatHistory { history } => self.on_history(history),
            InboundFrame::HistoryCleared { message } => {
                self.dispatch(Action::ClearMessages);
                let notice = Message::inbound(
                    Role::System,
                    message.unwrap_or_else(|| HISTORY_CLEARED_NOTICE.into()),
                );
                self.append(notice);
            }
            InboundFrame::FileMessage {
                message,
                files,
                metadata,
            } => {
                let mut metadata = metadata.unwrap_or_default();
                let _ = metadata.insert(FILES_KEY.into(), Value::Array(files));
                self.append_reply(Message::inbound(Role::Assistant, message).with_metadata(metadata));
            }
            InboundFrame::ResponseMetadata { metadata } => {
                info!(keys = ?metadata.keys().collect::<Vec<_>>(), "response metadata");
            }
            InboundFrame::Pong {} => {}
            InboundFrame::Unknown => debug!(kind = %kind, "ignoring unknown frame type"),
        }
    }

    fn append(&self, message: Message) {
        self.dispatch(Action::AddMessage(message.clone()));
        self.observer.on_message(&message);
    }

    fn append_reply(&self, message: Message) {
        self.append(message);
        self.dispatch(Action::SetTyping(false));
        self.dispatch(Action::SetLoading(false));
    }

    fn on_welcome(&self, text: String, session_id: String) {
        info!(session_id, "session started");
        self.dispatch(Action::SetSessionId(Some(SessionId::from(session_id))));

        if text.trim().is_empty() {
            return;
        }
        let greeted = self
            .store
            .snapshot()
            .messages
            .iter()
            .any(looks_like_welcome);
        if greeted {
            debug!("greeting already shown");
        } else {
            self.append(welcome_message(text));
        }
    }

    fn on_server_error(&self, text: String) {
        warn!(error = %text, "server reported error");
        self.dispatch(Action::SetError(Some(text.clone())));
        self.dispatch(Action::SetTyping(false));
        self.dispatch(Action::SetLoading(false));

        let failed: Vec<_> = self.pending.lock().drain().map(|(id, _)| id).collect();
        for id in failed {
            self.dispatch(Action::UpdateMessage {
                id,
                patch: MessagePatch::status(MessageStatus::Error),
            });
        }
        self.observer.on_error(&text);
    }

    fn on_history(&self, history: Vec<HistoryEntry>) {
        let received = history.len();
        let messages = dedupe_welcomes(history.into_iter().map(history_message).collect());
        debug!(received, kept = messages.len(), "history replayed");
        self.dispatch(Action::ReplaceMessages(messages.clone()));
        for message in &messages {
            self.observer.on_message(message);
        }
    }
}

fn history_message(entry: HistoryEntry) -> Message {
    let role = Role::from_wire(&entry.role, Role::Assistant);
    let mut message = Message::inbound(role, entry.content)
        .with_metadata(entry.metadata.unwrap_or_default());
    if let Some(at) = entry.timestamp.as_deref().and_then(parse_timestamp) {
        message = message.with_timestamp(at);
    }
    message
}
