//! WebSocket wire model.
//!
//! - [`WebSocketRequest`]: client → server, `{seq, action, data}`
//! - [`WebSocketResponse`]: server → client, correlated by `seq_reply`
//! - [`WebSocketEvent`]: server → client push, scoped by [`Broadcast`]
//! - [`ErrorInfo`]: error body; `detailed_error` never leaves the server

pub mod error;
pub mod event;
pub mod request;
pub mod response;

pub use error::ErrorInfo;
pub use event::{Broadcast, WebSocketEvent};
pub use request::WebSocketRequest;
pub use response::WebSocketResponse;

use serde::Deserialize;

/// Any frame a client can receive, distinguished by shape.
///
/// Responses always carry `status` and `seq_reply`; events carry `event`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum WebSocketMessage {
    /// Reply to a request sent on this connection.
    Response(WebSocketResponse),
    /// Server-originated event.
    Event(WebSocketEvent),
}

impl WebSocketMessage {
    /// Parse a text frame. Returns `None` for frames matching neither shape.
    pub fn from_json(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
