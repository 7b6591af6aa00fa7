//! Settings types.
//!
//! All structs serialize as camelCase and fill missing fields from
//! `Default`, so a settings file only needs the keys it changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignaroSettings {
    /// Listener and connection settings.
    pub server: ServerSettings,
    /// Role and addressing rules.
    pub routing: RoutingSettings,
    /// Token verification.
    pub auth: AuthSettings,
    /// Logging and metrics.
    pub logging: LoggingSettings,
}

impl SignaroSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.server.path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.path must start with '/': {}",
                self.server.path
            )));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if self.server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be at least 1".into(),
            ));
        }
        if self.server.pong_timeout_ms < self.server.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(format!(
                "server.pongTimeoutMs ({}) must not be shorter than server.heartbeatIntervalMs ({})",
                self.server.pong_timeout_ms, self.server.heartbeat_interval_ms
            )));
        }
        if self.routing.controller_role.is_empty() {
            return Err(SettingsError::InvalidValue(
                "routing.controllerRole must not be empty".into(),
            ));
        }
        if self.auth.enabled && self.auth.tokens.is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.enabled requires at least one entry in auth.tokens".into(),
            ));
        }
        Ok(())
    }
}

/// Listener and per-connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks a free port).
    pub port: u16,
    /// WebSocket endpoint path.
    pub path: String,
    /// Outbound messages buffered per connection before sends are refused.
    pub send_queue_capacity: usize,
    /// Largest accepted WebSocket message in bytes.
    pub max_message_size: usize,
    /// Interval between server pings in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Silence after which a connection is dropped, in milliseconds.
    pub pong_timeout_ms: u64,
    /// How long shutdown waits for connections to drain, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: "/stream".to_string(),
            send_queue_capacity: 256,
            max_message_size: 1024 * 1024,
            heartbeat_interval_ms: 30_000,
            pong_timeout_ms: 90_000,
            shutdown_timeout_ms: 5_000,
        }
    }
}

/// Role and addressing rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingSettings {
    /// `client` query value that designates the controller.
    pub controller_role: String,
    /// Identity for clients that present no `id` or `token`, and the
    /// destination of controller messages without a `to` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_client: Option<String>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            controller_role: "python".to_string(),
            default_client: None,
        }
    }
}

/// Token verification settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// When off, every connection is accepted.
    pub enabled: bool,
    /// Accepted tokens.
    pub tokens: Vec<String>,
}

/// Logging and metrics settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default log level. `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Install the Prometheus recorder and serve `/metrics`.
    pub metrics_enabled: bool,
    /// Per-module levels, e.g. `{"tower_http": "debug"}`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            metrics_enabled: true,
            module_levels: BTreeMap::new(),
        }
    }
}
