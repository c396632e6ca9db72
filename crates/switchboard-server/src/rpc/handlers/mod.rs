//! Built-in action handlers.

pub mod status;
pub mod system;
pub mod typing;

use crate::rpc::registry::ActionRegistry;

/// Liveness check.
pub const PING: &str = "ping";
/// Presence signal: the caller is typing in a channel.
pub const USER_TYPING: &str = "user_typing";
/// Every user with at least one live connection.
pub const GET_STATUSES: &str = "get_statuses";
/// Online/offline for the given users.
pub const GET_STATUSES_BY_IDS: &str = "get_statuses_by_ids";

/// Register every built-in action.
pub fn register_all(registry: &mut ActionRegistry) {
    registry.register(PING, system::PingHandler);
    registry.register(USER_TYPING, typing::UserTypingHandler);
    registry.register(GET_STATUSES, status::GetStatusesHandler);
    registry.register(GET_STATUSES_BY_IDS, status::GetStatusesByIdsHandler);
}
