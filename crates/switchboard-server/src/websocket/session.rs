//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use switchboard_core::model::event::EVENT_HELLO;
use switchboard_core::{ConnectionId, WebSocketEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::connection::{SendOutcome, WebConn};
use super::handler::handle_message;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::hub::Hub;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_HEARTBEAT_TIMEOUTS_TOTAL, WS_OVERFLOW_DISCONNECTS_TOTAL,
};
use crate::rpc::context::ActionContext;
use crate::rpc::registry::ActionRegistry;
use crate::rpc::router::WebSocketRouter;

/// How long the writer gets to flush its close frame after the connection
/// closes.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared collaborators every session needs.
#[derive(Clone)]
pub struct SessionDeps {
    /// Hub handle.
    pub hub: Hub,
    /// Action table.
    pub registry: Arc<ActionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

/// Run a WebSocket session for an authenticated client.
///
/// 1. Queues a `hello` event carrying the connection id
/// 2. Registers the connection with the hub
/// 3. Routes inbound text frames through a fresh [`WebSocketRouter`]
/// 4. Forwards queued responses and events, sends periodic Pings
/// 5. Deregisters and closes on disconnect, heartbeat timeout or overflow
#[instrument(skip_all, fields(connection_id = %connection_id, user_id = %user_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection_id: ConnectionId,
    user_id: String,
    deps: SessionDeps,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(deps.config.send_queue_size);
    let conn = Arc::new(WebConn::new(connection_id.clone(), user_id.clone(), send_tx));

    let started = Instant::now();
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Queued before registration so it is always the first frame.
    let hello = WebSocketEvent::new(EVENT_HELLO, "", "", user_id.as_str(), Vec::new())
        .with("server_version", env!("CARGO_PKG_VERSION"))
        .with("connection_id", connection_id.as_str());
    let _ = conn.send_json(&hello);
    deps.hub.register(conn.clone());

    let heartbeat = {
        let conn = conn.clone();
        let interval = deps.config.heartbeat_interval();
        let timeout = deps.config.heartbeat_timeout();
        tokio::spawn(async move {
            if run_heartbeat(conn.clone(), interval, timeout, conn.close_token()).await
                == HeartbeatResult::TimedOut
            {
                warn!(connection_id = %conn.id, ?timeout, "client unresponsive, disconnecting");
                counter!(WS_HEARTBEAT_TIMEOUTS_TOTAL).increment(1);
                conn.close();
            }
        })
    };

    let mut writer = {
        let conn = conn.clone();
        let ping_every = deps.config.heartbeat_interval();
        tokio::spawn(async move {
            let mut ping = tokio::time::interval(ping_every);
            let _ = ping.tick().await;
            loop {
                tokio::select! {
                    msg = send_rx.recv() => {
                        let Some(text) = msg else { break };
                        if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                            break;
                        }
                    }
                    _ = ping.tick() => {
                        if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                            break;
                        }
                    }
                    () = conn.closed() => break,
                }
            }
            conn.close();
            let _ = ws_tx.send(Message::Close(None)).await;
            let _ = ws_tx.close().await;
        })
    };

    let mut router = WebSocketRouter::new(deps.registry.clone());
    let ctx = ActionContext::new(user_id.as_str(), connection_id.clone(), deps.hub.clone());

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = conn.closed() => break,
        };
        let msg = match frame {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                debug!(error = %e, "read failed");
                break;
            }
            None => break,
        };
        conn.mark_alive();

        let text = match msg {
            Message::Text(t) => t.as_str().to_owned(),
            Message::Binary(data) => match String::from_utf8(data.to_vec()) {
                Ok(s) => s,
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF8 binary frame");
                    continue;
                }
            },
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => continue,
        };

        let result = tokio::select! {
            result = handle_message(&text, &mut router, &ctx) => result,
            () = conn.closed() => break,
        };
        match conn.send(result.response_json) {
            SendOutcome::Queued => {}
            SendOutcome::Full => {
                warn!(action = %result.action, "send queue full, disconnecting");
                counter!(WS_OVERFLOW_DISCONNECTS_TOTAL).increment(1);
                break;
            }
            SendOutcome::Closed => break,
        }
    }

    conn.close();
    deps.hub.unregister(&conn);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }
    heartbeat.abort();

    info!(dropped = conn.drop_count(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
}
