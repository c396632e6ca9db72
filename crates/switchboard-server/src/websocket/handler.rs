//! Inbound text frame handling: parse, route, serialize.

use std::sync::Arc;

use switchboard_core::{WebSocketRequest, WebSocketResponse};
use tracing::{debug, instrument};

use crate::rpc::context::ActionContext;
use crate::rpc::router::WebSocketRouter;

/// Result of handling one inbound frame.
pub struct HandleResult {
    /// Serialized response, ready for the outbound queue.
    pub response_json: Arc<String>,
    /// Action named by the request (empty if none).
    pub action: String,
    /// Typed response.
    pub response: WebSocketResponse,
}

/// Parse `message` leniently and route it.
///
/// Frames that are not valid requests are answered too: they surface as
/// `NoAction` rather than dropping the connection.
#[instrument(skip_all, fields(action, seq))]
pub async fn handle_message(
    message: &str,
    router: &mut WebSocketRouter,
    ctx: &ActionContext,
) -> HandleResult {
    let request = WebSocketRequest::from_json(message);
    let action = request.action.clone();
    let span = tracing::Span::current();
    let _ = span.record("action", action.as_str());
    let _ = span.record("seq", request.seq);
    debug!("routing request");

    let response = router.route(request, ctx).await;
    let json = serde_json::to_string(&response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize response");
        String::new()
    });
    HandleResult {
        response_json: Arc::new(json),
        action,
        response,
    }
}
