//! Transport error types.
//!
//! None of these are fatal to an open connection on their own: they are
//! reported through [`ConnectionEvent::Error`](crate::ConnectionEvent::Error)
//! and the reconnect policy decides what happens next.

use thiserror::Error;

/// Errors reported by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint URL or auth header could not be turned into a request.
    #[error("invalid connection request: {0}")]
    InvalidRequest(String),

    /// Opening the socket failed.
    #[error("failed to connect to {url}: {reason}")]
    Open {
        /// Endpoint URL.
        url: String,
        /// Underlying failure.
        reason: String,
    },

    /// The server refused the upgrade with 401/403.
    #[error("upgrade rejected: {0}")]
    Unauthorized(String),

    /// Handing a frame to the socket failed.
    #[error("failed to send frame: {0}")]
    Send(String),

    /// An inbound frame was not valid JSON.
    #[error("failed to parse frame: {0}")]
    Parse(String),

    /// The reconnect budget is spent.
    #[error("gave up after {attempts} reconnect attempts{}", last_error_suffix(.last_error.as_deref()))]
    ReconnectExhausted {
        /// Attempts made.
        attempts: u32,
        /// Most recent failure, if any.
        last_error: Option<String>,
    },
}

fn last_error_suffix(last_error: Option<&str>) -> String {
    last_error.map(|e| format!(": {e}")).unwrap_or_default()
}
