//! # signaro-settings
//!
//! Configuration for the signaling relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SignaroSettings::default()`]
//! 2. **Settings file**: `~/.signaro/settings.json` or an explicit path
//!    (deep-merged over defaults)
//! 3. **Environment variables**: `SIGNARO_*` overrides (highest priority)
//!
//! The loaded value is owned by the caller and passed down explicitly; there
//! is no process-wide settings instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings, load_settings_from_path, read_settings_file,
    settings_path,
};
pub use types::*;
