//! Server → client response frame.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ErrorInfo;

/// Status string of a successful response.
pub const STATUS_OK: &str = "OK";
/// Status string of a failed response.
pub const STATUS_FAIL: &str = "FAIL";

/// Reply to one [`WebSocketRequest`](super::WebSocketRequest).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebSocketResponse {
    /// `OK` or `FAIL`.
    pub status: String,
    /// Sequence number of the request this answers.
    pub seq_reply: i64,
    /// Handler output (success only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    /// Error body (failure only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl WebSocketResponse {
    /// Build a success response.
    pub fn ok(seq_reply: i64, data: Map<String, Value>) -> Self {
        Self {
            status: STATUS_OK.to_owned(),
            seq_reply,
            data: Some(data),
            error: None,
        }
    }

    /// Build a failure response. The detail is scrubbed here, so no error
    /// constructed through this path can leak diagnostics to the client.
    pub fn error(seq_reply: i64, error: ErrorInfo) -> Self {
        Self {
            status: STATUS_FAIL.to_owned(),
            seq_reply,
            data: None,
            error: Some(error.scrubbed()),
        }
    }

    /// Whether the request succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Stable id of the error, if any.
    pub fn error_id(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.id.as_str())
    }
}
