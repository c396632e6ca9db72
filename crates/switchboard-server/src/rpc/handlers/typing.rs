//! `user_typing`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use switchboard_core::WebSocketEvent;
use switchboard_core::model::event::EVENT_TYPING;
use tracing::debug;

use crate::rpc::context::ActionContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::ActionHandler;
use crate::rpc::validation::{optional_str, require_str};

/// Publishes a `typing` event to `channel_id`, omitting the caller.
///
/// Params: `channel_id` (required), `parent_id` (optional thread root).
pub struct UserTypingHandler;

#[async_trait]
impl ActionHandler for UserTypingHandler {
    async fn handle(
        &self,
        data: Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<Map<String, Value>, RpcError> {
        let channel_id = require_str(&data, "channel_id")?;
        let parent_id = optional_str(&data, "parent_id")?;

        let event = WebSocketEvent::new(
            EVENT_TYPING,
            "",
            channel_id,
            "",
            [ctx.user_id.clone()],
        )
        .with("user_id", ctx.user_id.as_str())
        .with("parent_id", parent_id);

        debug!(channel_id, user_id = %ctx.user_id, "user typing");
        ctx.hub.publish(event);
        Ok(Map::new())
    }
}
