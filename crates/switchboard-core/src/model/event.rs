//! Server-originated events and their broadcast scope.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user started typing in a channel.
pub const EVENT_TYPING: &str = "typing";
/// First frame sent on every new connection.
pub const EVENT_HELLO: &str = "hello";

/// Who an event is delivered to.
///
/// An empty `channel_id` is the universal scope. A non-empty `user_id` turns
/// the event into a targeted send to that user's connections. Users in
/// `omit_users` never receive the event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Users excluded regardless of scope.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub omit_users: BTreeSet<String>,
    /// Targeted recipient, or empty.
    #[serde(default)]
    pub user_id: String,
    /// Scoping channel, or empty for every connection.
    #[serde(default)]
    pub channel_id: String,
    /// Opaque extra context; carried, never interpreted by the hub.
    #[serde(default)]
    pub team_id: String,
}

impl Broadcast {
    /// Whether `user_id` is explicitly excluded.
    pub fn omits(&self, user_id: &str) -> bool {
        self.omit_users.contains(user_id)
    }

    /// Whether the event is restricted to one user.
    pub fn is_targeted(&self) -> bool {
        !self.user_id.is_empty()
    }

    /// Whether the event is channel-scoped.
    pub fn is_channel_scoped(&self) -> bool {
        !self.channel_id.is_empty()
    }
}

/// A server-pushed notification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WebSocketEvent {
    /// Event type (e.g. `typing`).
    pub event: String,
    /// Event payload.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Delivery scope.
    #[serde(default)]
    pub broadcast: Broadcast,
}

impl WebSocketEvent {
    /// Create an event with an empty payload.
    pub fn new(
        event: impl Into<String>,
        team_id: impl Into<String>,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        omit_users: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            event: event.into(),
            data: Map::new(),
            broadcast: Broadcast {
                omit_users: omit_users.into_iter().collect(),
                user_id: user_id.into(),
                channel_id: channel_id.into(),
                team_id: team_id.into(),
            },
        }
    }

    /// Set a payload field.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let _ = self.data.insert(key.into(), value.into());
    }

    /// Builder form of [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add(key, value);
        self
    }
}
