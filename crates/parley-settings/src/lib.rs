//! # parley-settings
//!
//! Configuration management with layered sources for the Parley chat client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ParleySettings::default()`]
//! 2. **User file**: `~/.parley/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PARLEY_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! let settings = parley_settings::load_settings()?;
//! println!("endpoint: {}", settings.chat.endpoint_url);
//! # Ok::<(), parley_settings::SettingsError>(())
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
