//! Branded ID newtypes for type safety.
//!
//! Every entity in Parley has a distinct ID type implemented as a newtype
//! wrapper around `String`, so a session ID can never be passed where a
//! message ID is expected.
//!
//! - [`MessageId`] is generated locally from wall-clock milliseconds plus a
//!   process-wide counter. Unique within a process, not across processes.
//! - [`SessionId`] is issued by the server in the `welcome` frame.
//! - [`ConnectionId`] is a UUID v7 minted per connection attempt for tracing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a conversation entry.
    MessageId
}

branded_id! {
    /// Server-issued conversation identifier.
    SessionId
}

branded_id! {
    /// Identifier for a single connection attempt.
    ConnectionId
}

impl MessageId {
    /// Generate a new local message ID: `msg_<unix millis>_<counter>`.
    ///
    /// The counter is process-wide and strictly increasing, so two IDs
    /// generated within the same millisecond still differ.
    #[must_use]
    pub fn generate() -> Self {
        let seq = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("msg_{millis}_{seq}"))
    }

    /// The counter component of a generated ID, if this ID was generated locally.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.0
            .strip_prefix("msg_")?
            .rsplit_once('_')
            .and_then(|(_, seq)| seq.parse().ok())
    }
}

impl ConnectionId {
    /// Create a new time-ordered connection ID (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}
