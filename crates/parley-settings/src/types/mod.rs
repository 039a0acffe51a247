//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so partial JSON
//! files are accepted and missing fields get their default value.

mod chat;
mod logging;

pub use chat::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "chat": { "endpointUrl": "wss://example.com/ws/chat", "autoConnect": false },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// Chat connection settings.
    pub chat: ChatSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl ParleySettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let url = self.chat.endpoint_url.as_str();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SettingsError::InvalidValue(format!(
                "chat.endpointUrl must use ws:// or wss://, got {url:?}"
            )));
        }
        if self.chat.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "chat.heartbeatIntervalMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let settings: ParleySettings =
            serde_json::from_str(r#"{"chat": {"autoConnect": false}}"#).unwrap();
        assert!(!settings.chat.auto_connect);
        assert_eq!(settings.chat.max_retries, 3);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(ParleySettings::default()).unwrap();
        assert!(v["chat"]["endpointUrl"].is_string());
        assert!(v["chat"]["heartbeatIntervalMs"].is_number());
        assert!(v["chat"].get("authToken").is_none());
    }

    #[test]
    fn validate_rejects_http_url() {
        let mut settings = ParleySettings::default();
        settings.chat.endpoint_url = "http://localhost/ws".into();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_heartbeat() {
        let mut settings = ParleySettings::default();
        settings.chat.heartbeat_interval_ms = 0;
        assert!(settings.validate().is_err());
    }
}
