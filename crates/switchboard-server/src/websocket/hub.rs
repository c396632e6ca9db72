//! The hub: single-owner registry of live connections.
//!
//! All state lives in one actor task that processes [`HubCommand`]s in
//! arrival order. [`Hub`] is a cheap cloneable handle that enqueues commands;
//! queries are answered over a `oneshot`.
//!
//! Publish semantics, per registered connection:
//! - owner in `omit_users` → skipped
//! - `broadcast.user_id` set and not the owner → skipped
//! - `broadcast.channel_id` set → delivered only if the membership resolver
//!   says the owner is a member
//! - otherwise delivered
//!
//! Delivery never blocks: a connection whose bounded queue is full is closed
//! and removed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use switchboard_core::{ConnectionId, WebSocketEvent};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connection::{SendOutcome, WebConn};
use crate::membership::ChannelMembership;
use crate::metrics::{
    WS_EVENTS_DELIVERED_TOTAL, WS_EVENTS_PUBLISHED_TOTAL, WS_OVERFLOW_DISCONNECTS_TOTAL,
};

/// Upper bound on one membership lookup. A lookup that overruns counts as
/// "not a member" so the actor keeps draining commands.
const MEMBERSHIP_TIMEOUT: Duration = Duration::from_secs(2);

/// The hub actor is no longer running.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("hub is not running")]
pub struct HubStopped;

/// Commands processed by the hub actor.
pub enum HubCommand {
    /// Add a connection, replacing any entry with the same id.
    Register(Arc<WebConn>),
    /// Remove a connection if it is still the registered one for its id.
    Unregister(Arc<WebConn>),
    /// Fan an event out to matching connections.
    Publish(Arc<WebSocketEvent>),
    /// Number of registered connections.
    Count(oneshot::Sender<usize>),
    /// Users with at least one registered connection.
    OnlineUsers(oneshot::Sender<BTreeSet<String>>),
    /// Close every connection and stop.
    Shutdown,
}

/// Handle to the hub actor.
#[derive(Clone, Debug)]
pub struct Hub {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl Hub {
    /// Spawn the actor. The task ends on [`shutdown`](Self::shutdown) or when
    /// every handle has been dropped.
    pub fn start(membership: Arc<dyn ChannelMembership>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = HubState {
            connections: HashMap::new(),
            membership,
        };
        let task = tokio::spawn(state.run(rx));
        (Self { tx }, task)
    }

    fn command(&self, cmd: HubCommand) {
        if self.tx.send(cmd).is_err() {
            debug!("hub stopped, command dropped");
        }
    }

    /// Register a connection.
    pub fn register(&self, conn: Arc<WebConn>) {
        self.command(HubCommand::Register(conn));
    }

    /// Deregister a connection. No-op if absent.
    pub fn unregister(&self, conn: &Arc<WebConn>) {
        self.command(HubCommand::Unregister(conn.clone()));
    }

    /// Publish an event. Returns immediately.
    pub fn publish(&self, event: WebSocketEvent) {
        self.command(HubCommand::Publish(Arc::new(event)));
    }

    /// Publish `event` to the connections of `user_id` only.
    pub fn send_to_user(&self, user_id: &str, mut event: WebSocketEvent) {
        user_id.clone_into(&mut event.broadcast.user_id);
        self.publish(event);
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> Result<usize, HubStopped> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(HubCommand::Count(tx)).map_err(|_| HubStopped)?;
        rx.await.map_err(|_| HubStopped)
    }

    /// Users with at least one registered connection.
    pub async fn online_users(&self) -> Result<BTreeSet<String>, HubStopped> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::OnlineUsers(tx))
            .map_err(|_| HubStopped)?;
        rx.await.map_err(|_| HubStopped)
    }

    /// Close every connection and stop the actor.
    pub fn shutdown(&self) {
        self.command(HubCommand::Shutdown);
    }
}

struct HubState {
    connections: HashMap<ConnectionId, Arc<WebConn>>,
    membership: Arc<dyn ChannelMembership>,
}

impl HubState {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<HubCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                HubCommand::Register(conn) => self.register(conn),
                HubCommand::Unregister(conn) => self.unregister(&conn),
                HubCommand::Publish(event) => self.publish(&event).await,
                HubCommand::Count(reply) => {
                    let _ = reply.send(self.connections.len());
                }
                HubCommand::OnlineUsers(reply) => {
                    let users = self
                        .connections
                        .values()
                        .map(|c| c.user_id().to_owned())
                        .collect();
                    let _ = reply.send(users);
                }
                HubCommand::Shutdown => break,
            }
        }
        info!(connections = self.connections.len(), "hub stopping");
        for conn in self.connections.values() {
            conn.close();
        }
    }

    fn register(&mut self, conn: Arc<WebConn>) {
        debug!(connection_id = %conn.id, user_id = conn.user_id(), "register");
        if let Some(prev) = self.connections.insert(conn.id.clone(), conn.clone()) {
            if !Arc::ptr_eq(&prev, &conn) {
                debug!(connection_id = %prev.id, "replacing previous connection with same id");
                prev.close();
            }
        }
    }

    fn unregister(&mut self, conn: &Arc<WebConn>) {
        let current = self
            .connections
            .get(&conn.id)
            .is_some_and(|c| Arc::ptr_eq(c, conn));
        if current {
            let _ = self.connections.remove(&conn.id);
            debug!(connection_id = %conn.id, "unregister");
        }
    }

    async fn publish(&mut self, event: &WebSocketEvent) {
        counter!(WS_EVENTS_PUBLISHED_TOTAL, "event" => event.event.clone()).increment(1);
        let broadcast = &event.broadcast;

        let candidates: Vec<Arc<WebConn>> = self
            .connections
            .values()
            .filter(|c| !broadcast.omits(c.user_id()))
            .filter(|c| !broadcast.is_targeted() || broadcast.user_id == c.user_id())
            .cloned()
            .collect();
        if candidates.is_empty() {
            return;
        }

        let recipients: Vec<Arc<WebConn>> = if broadcast.is_channel_scoped() {
            let mut members: HashMap<&str, bool> = HashMap::new();
            for conn in &candidates {
                if !members.contains_key(conn.user_id()) {
                    let lookup = self
                        .membership
                        .is_member(&broadcast.channel_id, conn.user_id());
                    let is_member = match tokio::time::timeout(MEMBERSHIP_TIMEOUT, lookup).await {
                        Ok(is_member) => is_member,
                        Err(_) => {
                            warn!(
                                channel_id = %broadcast.channel_id,
                                user_id = conn.user_id(),
                                "membership lookup timed out"
                            );
                            false
                        }
                    };
                    let _ = members.insert(conn.user_id(), is_member);
                }
            }
            candidates
                .iter()
                .filter(|c| members.get(c.user_id()).copied().unwrap_or(false))
                .cloned()
                .collect()
        } else {
            candidates
        };

        let frame = match serde_json::to_string(event) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(event = %event.event, error = %e, "failed to serialize event");
                return;
            }
        };

        let mut delivered = 0_u64;
        for conn in recipients {
            match conn.send(frame.clone()) {
                SendOutcome::Queued => delivered += 1,
                SendOutcome::Full => {
                    warn!(
                        connection_id = %conn.id,
                        user_id = conn.user_id(),
                        dropped = conn.drop_count(),
                        "send queue full, disconnecting"
                    );
                    counter!(WS_OVERFLOW_DISCONNECTS_TOTAL).increment(1);
                    conn.close();
                    self.unregister(&conn);
                }
                SendOutcome::Closed => self.unregister(&conn),
            }
        }
        counter!(WS_EVENTS_DELIVERED_TOTAL, "event" => event.event.clone()).increment(delivered);
        debug!(event = %event.event, channel_id = %broadcast.channel_id, delivered, "published");
    }
}
