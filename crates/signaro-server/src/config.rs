//! Server configuration.

use std::time::Duration;

use signaro_settings::ServerSettings;

/// Runtime configuration for the relay server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// `WebSocket` endpoint path.
    pub path: String,
    /// Outbound queue depth per connection.
    pub send_queue_capacity: usize,
    /// Max `WebSocket` message size in bytes.
    pub max_message_size: usize,
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Silence after which a connection is dropped.
    pub pong_timeout: Duration,
    /// How long shutdown waits for tasks to drain.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_settings(&ServerSettings::default())
    }
}

impl ServerConfig {
    /// Build from the `server` section of the settings file.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            path: settings.path.clone(),
            send_queue_capacity: settings.send_queue_capacity,
            max_message_size: settings.max_message_size,
            heartbeat_interval: Duration::from_millis(settings.heartbeat_interval_ms),
            pong_timeout: Duration::from_millis(settings.pong_timeout_ms),
            shutdown_timeout: Duration::from_millis(settings.shutdown_timeout_ms),
        }
    }

    /// Loopback config on an auto-assigned port.
    pub fn ephemeral() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ..Self::default()
        }
    }

    /// `host:port` string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
