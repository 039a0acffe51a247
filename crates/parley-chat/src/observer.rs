//! Application callbacks.

use parley_core::Message;

/// Notifications from a [`ChatClient`](crate::ChatClient).
///
/// Every method defaults to a no-op. Callbacks run on the event pump task
/// and must not block.
pub trait ChatObserver: Send + Sync {
    /// The server rejected the credentials. No reconnect will follow.
    fn on_auth_error(&self, _reason: &str) {}

    /// The socket opened (`true`) or closed (`false`).
    fn on_connection_change(&self, _connected: bool) {}

    /// A transport or server error was surfaced to the store.
    fn on_error(&self, _error: &str) {}

    /// An entry was appended from an inbound frame or replayed from history.
    fn on_message(&self, _message: &Message) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ChatObserver for NoopObserver {}
