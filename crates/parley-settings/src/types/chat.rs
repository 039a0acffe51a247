//! Chat connection settings.

use std::time::Duration;

use parley_core::retry::ReconnectPolicy;
use serde::{Deserialize, Serialize};

/// Chat endpoint, reconnect, retry, and heartbeat settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// WebSocket endpoint URL.
    pub endpoint_url: String,
    /// Connect as soon as the client is constructed.
    pub auto_connect: bool,
    /// Manual `retry()` budget.
    pub max_retries: u32,
    /// Delay unit for manual retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Heartbeat ping interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Base delay for automatic reconnect backoff in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Consecutive automatic reconnects before giving up.
    pub max_reconnect_attempts: u32,
    /// Bearer token sent on the upgrade request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            endpoint_url: "ws://localhost:8000/ws/chat".to_string(),
            auto_connect: true,
            max_retries: 3,
            retry_delay_ms: 1000,
            heartbeat_interval_ms: 30_000,
            reconnect_base_delay_ms: 1000,
            max_reconnect_attempts: 5,
            auth_token: None,
        }
    }
}

impl ChatSettings {
    /// Automatic reconnect policy.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay_ms: self.reconnect_base_delay_ms,
            max_attempts: self.max_reconnect_attempts,
        }
    }

    /// Heartbeat interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Manual retry delay unit.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_policy_from_settings() {
        let settings = ChatSettings {
            reconnect_base_delay_ms: 250,
            max_reconnect_attempts: 2,
            ..ChatSettings::default()
        };
        let policy = settings.reconnect_policy();
        assert_eq!(policy.base_delay_ms, 250);
        assert_eq!(policy.max_attempts, 2);
    }

    #[test]
    fn durations() {
        let settings = ChatSettings::default();
        assert_eq!(settings.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(settings.retry_delay(), Duration::from_secs(1));
    }
}
