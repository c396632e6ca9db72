//! One live WebSocket connection as seen by the hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use switchboard_core::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Result of enqueuing a frame for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame is in the outbound queue.
    Queued,
    /// The bounded queue is full; the client is not keeping up.
    Full,
    /// The connection is closed or its writer is gone.
    Closed,
}

/// A registered client connection.
///
/// The outbound side is a bounded queue drained by the session's writer
/// task. [`close`](Self::close) cancels the connection token, which stops the
/// reader, the writer and the heartbeat.
pub struct WebConn {
    /// Connection id (client-resumable).
    pub id: ConnectionId,
    user_id: String,
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Set on any inbound frame, cleared by the heartbeat.
    pub is_alive: AtomicBool,
    last_pong: Mutex<Instant>,
    /// Frames refused because the queue was full.
    pub dropped_messages: AtomicU64,
    closed: CancellationToken,
}

impl WebConn {
    /// Create an open connection owned by `user_id`.
    pub fn new(id: ConnectionId, user_id: impl Into<String>, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            user_id: user_id.into(),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Authenticated owner.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Enqueue a text frame without waiting.
    pub fn send(&self, message: Arc<String>) -> SendOutcome {
        if self.closed.is_cancelled() {
            return SendOutcome::Closed;
        }
        match self.tx.try_send(message) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Full
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Serialize `value` and enqueue it.
    pub fn send_json<T: Serialize>(&self, value: &T) -> SendOutcome {
        match serde_json::to_string(value) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                tracing::error!(connection_id = %self.id, error = %e, "failed to serialize frame");
                SendOutcome::Closed
            }
        }
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has not been called yet.
    pub fn is_open(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Token cancelled when the connection closes.
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Total frames refused because the queue was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Read and clear the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for WebConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebConn")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_connection(capacity: usize) -> (WebConn, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (WebConn::new(ConnectionId::from("conn_1"), "alice", tx), rx)
    }

    #[test]
    fn new_connection_is_open() {
        let (conn, _rx) = make_connection(4);
        assert_eq!(conn.id.as_str(), "conn_1");
        assert_eq!(conn.user_id(), "alice");
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn send_preserves_order() {
        let (conn, mut rx) = make_connection(8);
        for i in 0..3 {
            assert_eq!(conn.send(Arc::new(format!("m{i}"))), SendOutcome::Queued);
        }
        for i in 0..3 {
            assert_eq!(&*rx.recv().await.unwrap(), &format!("m{i}"));
        }
    }

    #[test]
    fn full_queue_reports_full_and_counts() {
        let (conn, _rx) = make_connection(1);
        assert_eq!(conn.send(Arc::new("a".into())), SendOutcome::Queued);
        assert_eq!(conn.send(Arc::new("b".into())), SendOutcome::Full);
        assert_eq!(conn.drop_count(), 1);
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (conn, rx) = make_connection(4);
        drop(rx);
        assert_eq!(conn.send(Arc::new("a".into())), SendOutcome::Closed);
        assert_eq!(conn.drop_count(), 0);
    }

    #[test]
    fn close_is_idempotent_and_blocks_sends() {
        let (conn, _rx) = make_connection(4);
        conn.close();
        conn.close();
        assert!(!conn.is_open());
        assert_eq!(conn.send(Arc::new("a".into())), SendOutcome::Closed);
    }

    #[tokio::test]
    async fn closed_future_resolves_after_close() {
        let (conn, _rx) = make_connection(4);
        let conn = Arc::new(conn);
        let waiter = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.closed().await })
        };
        conn.close();
        waiter.await.unwrap();
        assert!(conn.close_token().is_cancelled());
    }

    #[tokio::test]
    async fn send_json_serializes() {
        let (conn, mut rx) = make_connection(4);
        assert_eq!(
            conn.send_json(&serde_json::json!({"key": "value"})),
            SendOutcome::Queued
        );
        let parsed: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(parsed["key"], "value");
    }

    #[test]
    fn check_alive_resets_flag() {
        let (conn, _rx) = make_connection(4);
        assert!(conn.check_alive());
        assert!(!conn.check_alive());
        conn.mark_alive();
        assert!(conn.check_alive());
        assert!(conn.last_pong_elapsed() < Duration::from_secs(1));
        assert!(conn.age() < Duration::from_secs(1));
    }
}
