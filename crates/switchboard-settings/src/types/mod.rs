//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Types marked `#[serde(default)]`
//! accept partial JSON; missing fields get their default.

mod access;
mod server;

pub use access::*;
pub use server::*;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000, "sendQueueSize": 512 },
///   "logging": { "level": "debug" },
///   "auth": { "tokens": { "tok-alice": "alice" } },
///   "channels": { "town-square": ["alice", "bob"] }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitchboardSettings {
    /// Network and connection settings.
    pub server: ServerSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Static token → user mapping used by the built-in authenticator.
    pub auth: AuthSettings,
    /// Static channel → members mapping used by the built-in membership resolver.
    pub channels: BTreeMap<String, Vec<String>>,
}

impl SwitchboardSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.send_queue_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueSize must be greater than 0".into(),
            ));
        }
        if server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be greater than 0".into(),
            ));
        }
        if server.heartbeat_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.heartbeatIntervalMs must be greater than 0".into(),
            ));
        }
        if server.max_message_size == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxMessageSize must be greater than 0".into(),
            ));
        }
        if server.handler_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "server.handlerTimeoutMs must be greater than 0".into(),
            ));
        }
        if server.heartbeat_timeout_ms < server.heartbeat_interval_ms {
            return Err(SettingsError::InvalidValue(format!(
                "server.heartbeatTimeoutMs ({}) is shorter than server.heartbeatIntervalMs ({})",
                server.heartbeat_timeout_ms, server.heartbeat_interval_ms
            )));
        }
        Ok(())
    }
}
