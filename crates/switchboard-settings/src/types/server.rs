//! Server and logging settings.

use serde::{Deserialize, Serialize};

/// Server network and connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` = auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    ///
    /// Soft limit: it is checked before the upgrade, so upgrades racing each
    /// other can briefly push the count past it.
    pub max_connections: usize,
    /// Capacity of each connection's outbound queue. A connection whose queue
    /// fills up is disconnected.
    pub send_queue_size: usize,
    /// Interval between server Ping frames, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// Close a connection after no Pong for this long, in milliseconds.
    pub heartbeat_timeout_ms: u64,
    /// Max inbound WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Maximum time a single action handler may run, in milliseconds.
    pub handler_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8065,
            max_connections: 1024,
            send_queue_size: 256,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            max_message_size: 64 * 1024,
            handler_timeout_ms: 60_000,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`..`error`). `RUST_LOG` takes precedence.
    pub level: String,
    /// `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}
