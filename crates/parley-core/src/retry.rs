//! Reconnect policy and backoff calculation.
//!
//! Sync-only building blocks shared by the transport's auto-reconnect and the
//! chat client's manual retry. The async scheduling lives with the callers.
//!
//! - [`ReconnectPolicy`]: base delay and attempt budget
//! - [`calculate_backoff_delay`]: `base * 2^attempt`, saturating

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum consecutive reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

/// Exponential backoff budget for automatic reconnects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Base delay for exponential backoff in ms.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Consecutive failed attempts after which reconnecting stops.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next reconnect, given how many attempts were already
    /// scheduled. `None` once the budget is spent.
    #[must_use]
    pub fn next_delay(&self, attempts_so_far: u32) -> Option<Duration> {
        (attempts_so_far < self.max_attempts).then(|| {
            Duration::from_millis(calculate_backoff_delay(attempts_so_far, self.base_delay_ms))
        })
    }
}

/// Exponential backoff: `base_delay_ms * 2^attempt`, saturating at `u64::MAX`.
///
/// `attempt` is zero-based (0 for the first retry).
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64) -> u64 {
    base_delay_ms.saturating_mul(1u64 << attempt.min(63))
}
