//! # carelink-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CarelinkSettings::default()`]
//! 2. **User file**: `~/.carelink/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `CARELINK_*` overrides (highest priority)
//!
//! The loaded value is validated before it is returned and then passed
//! explicitly to whatever needs it; there is no global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, load_with_env, settings_path};
pub use types::{AuthSettings, CarelinkSettings, LoggingSettings, ServerSettings};
