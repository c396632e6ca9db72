//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use switchboard_settings::ServerSettings;

/// Runtime configuration for the hub server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    ///
    /// Soft limit: it is checked before the upgrade, so upgrades racing each
    /// other can briefly push the count past it.
    pub max_connections: usize,
    /// Bounded outbound queue per connection.
    pub send_queue_size: usize,
    /// Ping interval in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close after this long without a pong, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-action handler timeout in milliseconds.
    pub handler_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            send_queue_size: 256,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_message_size: 64 * 1024,
            handler_timeout_ms: 60_000,
        }
    }
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            max_connections: settings.max_connections,
            send_queue_size: settings.send_queue_size,
            heartbeat_interval_ms: settings.heartbeat_interval_ms,
            heartbeat_timeout_ms: settings.heartbeat_timeout_ms,
            max_message_size: settings.max_message_size,
            handler_timeout_ms: settings.handler_timeout_ms,
        }
    }

    /// `host:port` bind string.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ping interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Pong timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Handler timeout.
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }
}
