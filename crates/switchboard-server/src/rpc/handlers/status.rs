//! `get_statuses` and `get_statuses_by_ids`.
//!
//! A user is `online` while at least one of their connections is registered
//! with the hub.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::rpc::context::ActionContext;
use crate::rpc::errors::RpcError;
use crate::rpc::registry::ActionHandler;
use crate::rpc::validation::require_string_array;

/// Status string for a connected user.
pub const STATUS_ONLINE: &str = "online";
/// Status string for a user with no live connection.
pub const STATUS_OFFLINE: &str = "offline";

/// `{user_id: "online"}` for every connected user.
pub struct GetStatusesHandler;

#[async_trait]
impl ActionHandler for GetStatusesHandler {
    async fn handle(
        &self,
        _data: Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<Map<String, Value>, RpcError> {
        let online = ctx.hub.online_users().await.map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })?;
        Ok(online
            .into_iter()
            .map(|user| (user, Value::from(STATUS_ONLINE)))
            .collect())
    }
}

/// `{user_id: "online" | "offline"}` for each id in `user_ids`.
pub struct GetStatusesByIdsHandler;

#[async_trait]
impl ActionHandler for GetStatusesByIdsHandler {
    async fn handle(
        &self,
        data: Map<String, Value>,
        ctx: &ActionContext,
    ) -> Result<Map<String, Value>, RpcError> {
        let user_ids = require_string_array(&data, "user_ids")?;
        let online = ctx.hub.online_users().await.map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })?;
        Ok(user_ids
            .into_iter()
            .map(|user| {
                let status = if online.contains(&user) {
                    STATUS_ONLINE
                } else {
                    STATUS_OFFLINE
                };
                (user, Value::from(status))
            })
            .collect())
    }
}
