//! Per-connection context handed to every action handler.

use switchboard_core::ConnectionId;

use crate::websocket::hub::Hub;

/// Identity of the caller plus the collaborators handlers may use.
#[derive(Clone, Debug)]
pub struct ActionContext {
    /// Authenticated owner of the connection.
    pub user_id: String,
    /// Connection the request arrived on.
    pub connection_id: ConnectionId,
    /// Hub handle for publishing and presence queries.
    pub hub: Hub,
}

impl ActionContext {
    /// Bundle the caller identity with a hub handle.
    pub fn new(user_id: impl Into<String>, connection_id: ConnectionId, hub: Hub) -> Self {
        Self {
            user_id: user_id.into(),
            connection_id,
            hub,
        }
    }
}
