//! Connection manager configuration.

use std::time::Duration;

use parley_core::retry::ReconnectPolicy;

/// Default heartbeat interval.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default capacity of the outbound frame queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// WebSocket endpoint (`ws://` or `wss://`).
    pub url: String,
    /// Bearer token for the `Authorization` header of the upgrade request.
    pub auth_token: Option<String>,
    /// Interval between `ping` frames while connected.
    pub heartbeat_interval: Duration,
    /// Automatic reconnect budget.
    pub reconnect: ReconnectPolicy,
    /// Outbound frames that may be queued before `send_raw` starts refusing.
    pub outbound_buffer: usize,
}

impl ConnectionConfig {
    /// Configuration for `url` with default heartbeat and reconnect policy.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth_token: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            reconnect: ReconnectPolicy::default(),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
