//! Lifecycle events emitted by the connection manager.

use std::time::Duration;

use parley_core::ConnectionStatus;
use parley_core::protocol::close_code;
use serde_json::Value;

use crate::error::TransportError;

/// Everything observable about a connection, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The status changed.
    StatusChanged(ConnectionStatus),
    /// The socket opened.
    Connected,
    /// The socket closed for a reason other than authentication.
    Disconnected {
        /// Close code (1005 when the peer sent none, 1006 when the stream dropped).
        code: u16,
        /// Close reason.
        reason: String,
    },
    /// A decoded JSON frame. `pong` frames are consumed and never surface here.
    Message(Value),
    /// A non-fatal transport error.
    Error(TransportError),
    /// The peer closed with 4001 or refused the upgrade. No reconnect follows.
    AuthFailed {
        /// Close reason or HTTP status text.
        reason: String,
    },
    /// A reconnect attempt is scheduled.
    ReconnectScheduled {
        /// One-based attempt number.
        attempt: u32,
        /// Backoff delay before the attempt.
        delay: Duration,
    },
}

/// What an unexpected close leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Report an auth failure and stay down.
    AuthRequired,
    /// Report a disconnect and reconnect if the budget allows.
    Reconnect,
}

/// Classify a close code received on a connection that was not manually closed.
pub fn classify_close(code: u16) -> CloseDisposition {
    if code == close_code::AUTH_REQUIRED {
        CloseDisposition::AuthRequired
    } else {
        CloseDisposition::Reconnect
    }
}
