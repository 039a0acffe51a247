//! Shared holder for the current snapshot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::action::Action;
use crate::reducer::reduce;
use crate::state::ConversationState;

/// Owns the current [`ConversationState`] and applies actions to it.
///
/// Readers get an `Arc` to an immutable snapshot; a dispatch swaps in a new
/// one under the write lock.
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<Arc<ConversationState>>,
}

impl Store {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with `state`.
    pub fn with_state(state: ConversationState) -> Self {
        Self {
            state: RwLock::new(Arc::new(state)),
        }
    }

    /// Apply `action` and return the resulting snapshot.
    pub fn dispatch(&self, action: Action) -> Arc<ConversationState> {
        let mut guard = self.state.write();
        let next = Arc::new(reduce(&guard, action));
        *guard = Arc::clone(&next);
        next
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<ConversationState> {
        Arc::clone(&self.state.read())
    }
}
