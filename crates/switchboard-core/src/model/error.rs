//! Error body carried inside a failed response.

use serde::{Deserialize, Serialize};

/// Structured error returned to clients.
///
/// `id` is the stable, machine-readable key clients branch on.
/// `detailed_error` holds server-side diagnostics and is cleared by
/// [`ErrorInfo::scrubbed`] before anything is serialized to the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error id (e.g. `api.web_socket_router.bad_seq.app_error`).
    pub id: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Internal detail. Always empty on the wire.
    #[serde(default)]
    pub detailed_error: String,
    /// HTTP-style status code.
    #[serde(default)]
    pub status_code: u16,
}

impl ErrorInfo {
    /// Create an error with no detail attached.
    pub fn new(id: impl Into<String>, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            detailed_error: String::new(),
            status_code,
        }
    }

    /// Attach server-side diagnostic detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detailed_error = detail.into();
        self
    }

    /// Drop the diagnostic detail so the error is safe to send to a client.
    #[must_use]
    pub fn scrubbed(mut self) -> Self {
        self.detailed_error.clear();
        self
    }
}
