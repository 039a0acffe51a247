//! The pure state transition function.

use parley_core::{ConnectionStatus, Message};
use tracing::debug;

use crate::action::{Action, MessagePatch};
use crate::state::ConversationState;

/// Compute the state that follows `state` after `action`.
///
/// Always returns a fresh value, even when nothing changed. Updates that
/// target a delivered or errored message, or that would move a status
/// backwards, are ignored.
pub fn reduce(state: &ConversationState, action: Action) -> ConversationState {
    let mut next = state.clone();
    match action {
        Action::SetConnected(true) => {
            next.is_connected = true;
            next.connection_status = ConnectionStatus::Connected;
        }
        Action::SetConnected(false) => {
            next.is_connected = false;
            if next.connection_status != ConnectionStatus::Error {
                next.connection_status = ConnectionStatus::Disconnected;
            }
        }
        Action::SetConnectionStatus(status) => {
            next.connection_status = status;
            next.is_connected = status == ConnectionStatus::Connected;
        }
        Action::SetSessionId(session_id) => next.session_id = session_id,
        Action::SetLoading(loading) => next.is_loading = loading,
        Action::SetTyping(typing) => next.is_typing = typing,
        Action::SetError(error) => next.error = error,
        Action::AddMessage(message) => next.messages.push(message),
        Action::UpdateMessage { id, patch } => {
            if let Some(message) = next.messages.iter_mut().find(|m| m.id == id) {
                apply_patch(message, patch);
            } else {
                debug!(message_id = %id, "update for unknown message");
            }
        }
        Action::DeleteMessage(id) => next.messages.retain(|m| m.id != id),
        Action::ClearMessages => next.messages.clear(),
        Action::ReplaceMessages(messages) => next.messages = messages,
        Action::TouchLastActivity(at) => next.last_activity = Some(at),
    }
    next
}

fn apply_patch(message: &mut Message, patch: MessagePatch) {
    if message.status.is_terminal() {
        debug!(message_id = %message.id, status = %message.status, "message is final");
        return;
    }
    if let Some(status) = patch.status {
        if !message.status.can_transition_to(status) {
            debug!(
                message_id = %message.id,
                from = %message.status,
                to = %status,
                "illegal status transition"
            );
            return;
        }
    }

    if let Some(content) = patch.content {
        message.content = content;
    }
    if let Some(status) = patch.status {
        message.status = status;
    }
    if let Some(extra) = patch.metadata {
        message.metadata.get_or_insert_with(Default::default).extend(extra);
    }
}
