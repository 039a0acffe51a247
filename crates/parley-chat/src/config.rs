//! Orchestrator configuration.

use std::time::Duration;

use parley_core::retry::ReconnectPolicy;
use parley_settings::ChatSettings;
use parley_transport::ConnectionConfig;

/// User/assistant turns included in the `context` of every chat frame.
pub const DEFAULT_CONTEXT_WINDOW: usize = 10;

/// Runtime configuration for a [`ChatClient`](crate::ChatClient).
#[derive(Clone, Debug, PartialEq)]
pub struct ChatConfig {
    /// WebSocket endpoint.
    pub endpoint_url: String,
    /// Connect during construction.
    pub auto_connect: bool,
    /// Manual `retry()` budget.
    pub max_retries: u32,
    /// Delay unit for manual retries; attempt `n` waits `n * retry_delay`.
    pub retry_delay: Duration,
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Automatic reconnect budget.
    pub reconnect: ReconnectPolicy,
    /// Bearer token for the upgrade request.
    pub auth_token: Option<String>,
    /// Recent turns sent as conversation context.
    pub context_window: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::from(&ChatSettings::default())
    }
}

impl From<&ChatSettings> for ChatConfig {
    fn from(settings: &ChatSettings) -> Self {
        Self {
            endpoint_url: settings.endpoint_url.clone(),
            auto_connect: settings.auto_connect,
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay(),
            heartbeat_interval: settings.heartbeat_interval(),
            reconnect: settings.reconnect_policy(),
            auth_token: settings.auth_token.clone(),
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl ChatConfig {
    /// Transport configuration derived from this config.
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.endpoint_url.clone())
            .with_heartbeat_interval(self.heartbeat_interval)
            .with_reconnect(self.reconnect);
        if let Some(token) = &self.auth_token {
            config = config.with_auth_token(token.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let config = ChatConfig::default();
        assert_eq!(config.endpoint_url, "ws://localhost:8000/ws/chat");
        assert!(config.auto_connect);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.reconnect, ReconnectPolicy::default());
        assert_eq!(config.context_window, 10);
    }

    #[test]
    fn connection_config_carries_token() {
        let settings = ChatSettings {
            auth_token: Some("tok".into()),
            heartbeat_interval_ms: 5_000,
            ..ChatSettings::default()
        };
        let connection = ChatConfig::from(&settings).connection_config();
        assert_eq!(connection.auth_token.as_deref(), Some("tok"));
        assert_eq!(connection.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(connection.url, settings.endpoint_url);
    }
}
