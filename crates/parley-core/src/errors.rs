//! Errors surfaced by chat actions.
//!
//! [`ChatError`] is what `send_message`, `clear_history`, `request_history`
//! and `retry` fail with. Validation and connectivity failures are raised at
//! the call site before anything reaches the transport.

use thiserror::Error;

/// Error returned by user-facing chat actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The request was rejected before reaching the transport.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The channel is not open.
    #[error("not connected to chat server")]
    NotConnected,

    /// The transport refused the payload.
    #[error("failed to send {what}")]
    SendFailed {
        /// What was being sent (`"message"`, `"clear_history"`, ...).
        what: &'static str,
    },

    /// The manual retry budget is spent.
    #[error("maximum retry attempts reached ({attempts})")]
    RetriesExhausted {
        /// Attempts made, including the rejected one.
        attempts: u32,
    },
}

/// Result type for chat actions.
pub type Result<T> = std::result::Result<T, ChatError>;
