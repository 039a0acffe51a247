//! The seam between the orchestrator and the socket.

use parley_transport::ConnectionManager;
use serde_json::Value;

/// What the orchestrator needs from a connection.
///
/// Implemented by [`ConnectionManager`]; tests substitute an in-memory
/// transport. Implementations must not call back into the client while
/// holding their own locks.
pub trait Transport: Send + Sync {
    /// Start connecting. No-op when already connected or connecting.
    fn connect(&self);
    /// Close and stop reconnecting.
    fn disconnect(&self);
    /// Whether frames can be sent right now.
    fn is_connected(&self) -> bool;
    /// Hand a JSON frame to the socket. `false` when it was not accepted.
    fn send_json(&self, frame: &Value) -> bool;
}

impl Transport for ConnectionManager {
    fn connect(&self) {
        ConnectionManager::connect(self);
    }

    fn disconnect(&self) {
        ConnectionManager::disconnect(self);
    }

    fn is_connected(&self) -> bool {
        ConnectionManager::is_connected(self)
    }

    fn send_json(&self, frame: &Value) -> bool {
        self.send_message(frame)
    }
}
