//! # parley-store
//!
//! Conversation state for the Parley chat client.
//!
//! State changes only through [`reduce`], a pure function from the current
//! [`ConversationState`] and an [`Action`] to the next state. [`Store`] holds
//! the current snapshot behind an `Arc` so readers never observe a partial
//! update.

#![deny(unsafe_code)]

pub mod action;
pub mod reducer;
pub mod state;
pub mod store;

pub use action::{Action, MessagePatch};
pub use reducer::reduce;
pub use state::ConversationState;
pub use store::Store;
