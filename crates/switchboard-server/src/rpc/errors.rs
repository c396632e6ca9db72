//! Router and handler error type with stable wire ids.

use switchboard_core::ErrorInfo;
use thiserror::Error;

/// Request carried no action.
pub const NO_ACTION: &str = "api.web_socket_router.no_action.app_error";
/// Request named an action nobody registered.
pub const BAD_ACTION: &str = "api.web_socket_router.bad_action.app_error";
/// Request sequence did not increase.
pub const BAD_SEQUENCE: &str = "api.web_socket_router.bad_seq.app_error";
/// Handler rejected its parameters.
pub const INVALID_PARAM: &str = "api.websocket_handler.invalid_param.app_error";
/// Handler failed or timed out.
pub const INTERNAL_ERROR: &str = "api.websocket_handler.internal.app_error";

/// Error returned by the router or an action handler.
///
/// None of these terminate the connection; each becomes a `FAIL` response.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Empty or missing action.
    #[error("No websocket action")]
    NoAction,

    /// Action not present in the registry.
    #[error("Invalid websocket action")]
    BadAction {
        /// The action the client asked for.
        action: String,
    },

    /// Sequence not strictly greater than the last accepted one.
    #[error("Invalid or missing sequence")]
    BadSequence {
        /// Sequence on the rejected request.
        seq: i64,
        /// Last sequence accepted on this connection.
        last: i64,
    },

    /// A parameter is missing, empty, mistyped or too long.
    #[error("Invalid {name} parameter")]
    InvalidParam {
        /// Parameter name.
        name: String,
        /// What was wrong with it. Never sent to clients.
        detail: String,
    },

    /// Handler failure.
    #[error("Internal error")]
    Internal {
        /// Diagnostic message. Never sent to clients.
        message: String,
    },
}

impl RpcError {
    /// Shorthand for [`RpcError::InvalidParam`].
    pub fn invalid_param(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidParam {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Stable id clients branch on.
    pub fn id(&self) -> &'static str {
        match self {
            Self::NoAction => NO_ACTION,
            Self::BadAction { .. } => BAD_ACTION,
            Self::BadSequence { .. } => BAD_SEQUENCE,
            Self::InvalidParam { .. } => INVALID_PARAM,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Short label used for the `error_type` metric.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoAction => "no_action",
            Self::BadAction { .. } => "bad_action",
            Self::BadSequence { .. } => "bad_sequence",
            Self::InvalidParam { .. } => "invalid_param",
            Self::Internal { .. } => "internal",
        }
    }

    /// HTTP-style status.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Internal { .. } => 500,
            _ => 400,
        }
    }

    /// Server-side diagnostic detail.
    pub fn detail(&self) -> String {
        match self {
            Self::NoAction => String::new(),
            Self::BadAction { action } => format!("action={action}"),
            Self::BadSequence { seq, last } => format!("seq={seq} last={last}"),
            Self::InvalidParam { detail, .. } => detail.clone(),
            Self::Internal { message } => message.clone(),
        }
    }

    /// Full error body, detail included. Scrub before sending.
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.id(), self.to_string(), self.status_code()).with_detail(self.detail())
    }
}
