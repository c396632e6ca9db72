//! Client error type.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised by [`WebSocketClient`](crate::WebSocketClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not be opened.
    #[error("connection failed: {0}")]
    Connection(#[from] tungstenite::Error),

    /// The client has no open transport.
    #[error("not connected")]
    NotConnected,

    /// The upgrade request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A request could not be serialized.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
