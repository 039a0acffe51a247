//! # parley-chat
//!
//! Chat orchestrator for the Parley client.
//!
//! [`ChatClient`] sits between a [`Transport`] (normally a
//! [`parley_transport::ConnectionManager`]) and a [`parley_store::Store`]:
//!
//! - inbound frames become store actions (`welcome`, `message`, `error`,
//!   `chat_history`, `history_cleared`, `file_message`, ...)
//! - user intents become outbound frames (`chat`, `clear_history`,
//!   `chat_history`)
//! - outbound messages are tracked in a pending table until the transport
//!   accepts them; a server `error` frame fails everything still pending
//! - repeated greetings from reconnects or history replays are collapsed to
//!   one
//!
//! Applications observe changes through [`ChatObserver`] or by reading
//! [`ChatClient::snapshot`].

#![deny(unsafe_code)]

pub mod client;
pub mod config;
mod inbound;
pub mod observer;
pub mod transport;
pub mod welcome;

pub use client::{ChatClient, ContextTurn, SendOptions};
pub use config::ChatConfig;
pub use inbound::HISTORY_CLEARED_NOTICE;
pub use observer::{ChatObserver, NoopObserver};
pub use transport::Transport;
