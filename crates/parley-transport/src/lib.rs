//! # parley-transport
//!
//! Reconnecting WebSocket connection manager.
//!
//! [`ConnectionManager`] owns at most one socket at a time. It performs
//! connect/disconnect, heartbeat pings, exponential-backoff auto-reconnect,
//! and JSON framing, and reports everything that happens as
//! [`ConnectionEvent`]s on a channel returned by [`ConnectionManager::new`].
//! It has no knowledge of chat semantics.
//!
//! ```text
//!   ConnectionManager (handle)          supervised task (per connect())
//!   ─────────────────────────           ─────────────────────────────────
//!   send_raw ──try_send──► outbound ──► socket sink
//!   disconnect ──cancel──► token   ──► close(1000), stop reconnecting
//!                                      socket stream ──► ConnectionEvent ──► receiver
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod events;
pub mod manager;
mod session;

pub use config::ConnectionConfig;
pub use error::TransportError;
pub use events::{CloseDisposition, ConnectionEvent, classify_close};
pub use manager::ConnectionManager;
pub use parley_core::ConnectionStatus;
