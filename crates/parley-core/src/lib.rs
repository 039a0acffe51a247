//! # parley-core
//!
//! Foundation types, wire frames, errors, and logging for the Parley chat client.
//!
//! This crate provides the shared vocabulary that all other Parley crates depend on:
//!
//! - **Branded IDs**: `MessageId`, `SessionId`, `ConnectionId` as newtypes for type safety
//! - **Connection status**: `ConnectionStatus` shared by transport and store
//! - **Messages**: `Message` with `Role`, `MessageStatus` and an open metadata bag
//! - **Protocol**: `OutboundFrame` / `InboundFrame` JSON wire shapes and reserved close codes
//! - **Retry**: exponential backoff math shared by reconnect and retry paths
//! - **Errors**: `ChatError` via `thiserror`
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod protocol;
pub mod retry;

pub use connection::ConnectionStatus;
pub use errors::{ChatError, Result};
pub use ids::{ConnectionId, MessageId, SessionId};
pub use messages::{Message, MessageStatus, Metadata, Role};
