//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SignaroSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `SIGNARO_*` environment overrides
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::SignaroSettings;

/// Resolve the default settings path (`~/.signaro/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".signaro").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<SignaroSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path` with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or a settings combination
/// that fails [`SignaroSettings::validate`] is an error.
pub fn load_settings_from_path(path: &Path) -> Result<SignaroSettings> {
    let mut settings = read_settings_file(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    settings.validate()?;
    Ok(settings)
}

/// Defaults deep-merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<SignaroSettings> {
    let defaults = serde_json::to_value(SignaroSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `SIGNARO_*` overrides read through `lookup`.
///
/// Invalid values are logged and ignored, leaving the file/default value.
pub fn apply_overrides<F>(settings: &mut SignaroSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("SIGNARO_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("SIGNARO_PORT", 0, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.string("SIGNARO_PATH") {
        settings.server.path = v;
    }
    if let Some(v) = env.usize("SIGNARO_SEND_QUEUE", 1, 1_000_000) {
        settings.server.send_queue_capacity = v;
    }
    if let Some(v) = env.usize("SIGNARO_MAX_MESSAGE_SIZE", 1024, 1_073_741_824) {
        settings.server.max_message_size = v;
    }
    if let Some(v) = env.u64("SIGNARO_HEARTBEAT_INTERVAL_MS", 100, 3_600_000) {
        settings.server.heartbeat_interval_ms = v;
    }
    if let Some(v) = env.u64("SIGNARO_PONG_TIMEOUT_MS", 100, 3_600_000) {
        settings.server.pong_timeout_ms = v;
    }

    // ── Routing ─────────────────────────────────────────────────────
    if let Some(v) = env.string("SIGNARO_CONTROLLER_ROLE") {
        settings.routing.controller_role = v;
    }
    if let Some(v) = env.string("SIGNARO_DEFAULT_CLIENT") {
        settings.routing.default_client = Some(v);
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = env.bool("SIGNARO_AUTH_ENABLED") {
        settings.auth.enabled = v;
    }
    if let Some(v) = env.string("SIGNARO_AUTH_TOKENS") {
        settings.auth.tokens = v
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("SIGNARO_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("SIGNARO_LOG_JSON") {
        settings.logging.json = v;
    }
    if let Some(v) = env.bool("SIGNARO_METRICS_ENABLED") {
        settings.logging.metrics_enabled = v;
    }
}

// ── Value parsers ───────────────────────────────────────────────────────────

/// Parse a boolean: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an integer and keep it only if it lies in `min..=max`.
pub fn parse_in_range<T>(val: &str, min: T, max: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd,
{
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        self.ranged(name, min, max)
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        self.ranged(name, min, max)
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        self.ranged(name, min, max)
    }

    fn ranged<T>(&self, name: &str, min: T, max: T) -> Option<T>
    where
        T: std::str::FromStr + PartialOrd,
    {
        let val = (self.lookup)(name)?;
        let result = parse_in_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
