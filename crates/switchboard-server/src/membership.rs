//! Channel membership lookups used to scope published events.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

/// Answers whether a user is a recipient of a channel.
///
/// Queried by the hub at publish time, once per distinct user per event.
/// The lookup is awaited inside the hub actor, so every other hub command
/// waits on it. Implementations should answer from memory or a cache; a
/// lookup that runs past the hub's time limit is treated as "not a member".
#[async_trait]
pub trait ChannelMembership: Send + Sync {
    /// Whether `user_id` receives events scoped to `channel_id`.
    async fn is_member(&self, channel_id: &str, user_id: &str) -> bool;
}

/// In-memory membership table.
///
/// Unknown channels have no members, so events scoped to them reach nobody.
#[derive(Debug, Default)]
pub struct StaticMembership {
    channels: RwLock<HashMap<String, HashSet<String>>>,
}

impl StaticMembership {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a channel → members mapping (as found in settings).
    pub fn from_channels(channels: &BTreeMap<String, Vec<String>>) -> Self {
        let table = channels
            .iter()
            .map(|(channel, members)| (channel.clone(), members.iter().cloned().collect()))
            .collect();
        Self {
            channels: RwLock::new(table),
        }
    }

    /// Add `user_id` to `channel_id`.
    pub fn add_member(&self, channel_id: &str, user_id: &str) {
        let _ = self
            .channels
            .write()
            .entry(channel_id.to_owned())
            .or_default()
            .insert(user_id.to_owned());
    }

    /// Remove `user_id` from `channel_id`. Returns whether it was a member.
    pub fn remove_member(&self, channel_id: &str, user_id: &str) -> bool {
        self.channels
            .write()
            .get_mut(channel_id)
            .is_some_and(|members| members.remove(user_id))
    }

    fn contains(&self, channel_id: &str, user_id: &str) -> bool {
        self.channels
            .read()
            .get(channel_id)
            .is_some_and(|members| members.contains(user_id))
    }
}

#[async_trait]
impl ChannelMembership for StaticMembership {
    async fn is_member(&self, channel_id: &str, user_id: &str) -> bool {
        self.contains(channel_id, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_table_has_no_members() {
        let m = StaticMembership::new();
        assert!(!m.is_member("town-square", "alice").await);
    }

    #[tokio::test]
    async fn from_settings_map() {
        let mut channels = BTreeMap::new();
        let _ = channels.insert("c1".to_string(), vec!["alice".to_string(), "bob".to_string()]);
        let m = StaticMembership::from_channels(&channels);
        assert!(m.is_member("c1", "alice").await);
        assert!(m.is_member("c1", "bob").await);
        assert!(!m.is_member("c1", "carol").await);
        assert!(!m.is_member("c2", "alice").await);
    }

    #[tokio::test]
    async fn add_and_remove() {
        let m = StaticMembership::new();
        m.add_member("c1", "alice");
        assert!(m.is_member("c1", "alice").await);
        assert!(m.remove_member("c1", "alice"));
        assert!(!m.remove_member("c1", "alice"));
        assert!(!m.is_member("c1", "alice").await);
    }
}
