//! Per-connection request router.
//!
//! Each connection owns one [`WebSocketRouter`]; it holds the last accepted
//! sequence number, so requests on a connection must be routed serially.
//!
//! Validation short-circuits in this order:
//! 1. empty action → [`RpcError::NoAction`]
//! 2. unregistered action → [`RpcError::BadAction`]
//! 3. sequence not greater than the last accepted one → [`RpcError::BadSequence`]
//! 4. handler parameter checks → [`RpcError::InvalidParam`]

use std::sync::Arc;

use metrics::counter;
use switchboard_core::{WebSocketRequest, WebSocketResponse};
use tracing::debug;

use crate::metrics::{RPC_ERRORS_TOTAL, RPC_REQUESTS_TOTAL};
use crate::rpc::context::ActionContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::ActionRegistry;

/// Validates and dispatches the requests of a single connection.
pub struct WebSocketRouter {
    registry: Arc<ActionRegistry>,
    last_seq: i64,
}

impl WebSocketRouter {
    /// Fresh router; the first accepted sequence must be at least 1.
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            last_seq: 0,
        }
    }

    /// Last accepted sequence (0 before any request was accepted).
    pub fn last_seq(&self) -> i64 {
        self.last_seq
    }

    /// Run the router checks. On success the sequence is recorded.
    pub fn validate(&mut self, request: &WebSocketRequest) -> Result<(), RpcError> {
        if request.action.is_empty() {
            return Err(RpcError::NoAction);
        }
        if !self.registry.has_action(&request.action) {
            return Err(RpcError::BadAction {
                action: request.action.clone(),
            });
        }
        if request.seq <= self.last_seq {
            return Err(RpcError::BadSequence {
                seq: request.seq,
                last: self.last_seq,
            });
        }
        self.last_seq = request.seq;
        Ok(())
    }

    /// Validate, dispatch and build the correlated response.
    pub async fn route(
        &mut self,
        request: WebSocketRequest,
        ctx: &ActionContext,
    ) -> WebSocketResponse {
        let seq = request.seq;
        let action = request.action.clone();
        let label = metric_action(&action, self.registry.has_action(&action));
        counter!(RPC_REQUESTS_TOTAL, "action" => label.clone()).increment(1);

        let result = match self.validate(&request) {
            Ok(()) => self.registry.dispatch(&action, request.data, ctx).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(data) => WebSocketResponse::ok(seq, data),
            Err(err) => {
                counter!(
                    RPC_ERRORS_TOTAL,
                    "action" => label,
                    "error_type" => err.kind()
                )
                .increment(1);
                let info = err.to_error_info();
                debug!(
                    action = %action,
                    seq,
                    error_id = %info.id,
                    detail = %info.detailed_error,
                    "request failed"
                );
                WebSocketResponse::error(seq, info)
            }
        }
    }
}

/// Metric label for an action. Only registered names pass through so
/// client-chosen strings cannot grow label cardinality.
fn metric_action(action: &str, registered: bool) -> String {
    if action.is_empty() {
        "<none>".to_owned()
    } else if registered {
        action.to_owned()
    } else {
        "<unknown>".to_owned()
    }
}
