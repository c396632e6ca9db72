//! End-to-end tests: a real server driven by `switchboard-client` and raw
//! `tokio-tungstenite` sockets.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::{SinkExt, StreamExt};
use switchboard_client::{ClientError, WebSocketClient};
use switchboard_core::model::event::EVENT_TYPING;
use switchboard_core::{ConnectionId, WebSocketEvent};
use switchboard_server::auth::StaticTokenAuthenticator;
use switchboard_server::config::ServerConfig;
use switchboard_server::membership::StaticMembership;
use switchboard_server::rpc::context::ActionContext;
use switchboard_server::rpc::errors::{BAD_ACTION, BAD_SEQUENCE, INVALID_PARAM, NO_ACTION, RpcError};
use switchboard_server::rpc::handlers::register_all;
use switchboard_server::rpc::registry::{ActionHandler, ActionRegistry};
use switchboard_server::server::HubServer;
use tokio::time::{Instant, sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(500);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    server: HubServer,
    url: String,
}

impl TestServer {
    fn client(&self, token: &str) -> WebSocketClient {
        WebSocketClient::new(self.url.clone(), token)
    }

    /// Connected, listening client whose `hello` has arrived.
    async fn connected(&self, token: &str) -> WebSocketClient {
        let mut client = self.client(token);
        client.connect().await.unwrap();
        client.listen().unwrap();
        let _ = client.next_event_named("hello", TIMEOUT).await.expect("hello");
        client
    }

    /// Raw socket authenticated via the query string.
    async fn raw(&self, token: &str, connection_id: Option<&str>) -> WsStream {
        let mut url = format!("{}?token={token}", self.url);
        if let Some(id) = connection_id {
            url.push_str(&format!("&connection_id={id}"));
        }
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn wait_for_count(&self, expected: usize) {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            if self.server.hub().connection_count().await.unwrap() == expected {
                return;
            }
            assert!(Instant::now() < deadline, "never reached {expected} connections");
            sleep(Duration::from_millis(20)).await;
        }
    }
}

async fn boot() -> TestServer {
    boot_with(ServerConfig::default()).await
}

/// Boot a server on an ephemeral port. `alice` and `bob` are members of
/// channel `c1`; nobody is a member of `c2`.
async fn boot_with(config: ServerConfig) -> TestServer {
    let membership = Arc::new(StaticMembership::new());
    membership.add_member("c1", "alice");
    membership.add_member("c1", "bob");
    let auth = Arc::new(
        StaticTokenAuthenticator::default()
            .with_token("tok-alice", "alice")
            .with_token("tok-bob", "bob")
            .with_token("tok-slow", "slow"),
    );
    let mut registry = ActionRegistry::new();
    register_all(&mut registry);

    let server = HubServer::new(config, registry, auth, membership);
    let (addr, _handle) = server.listen().await.unwrap();
    TestServer {
        server,
        url: format!("ws://{addr}/ws"),
    }
}

/// Next text frame on a raw socket, parsed as JSON.
async fn next_json(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("frame timeout")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read until the server closes the socket.
async fn wait_closed(ws: &mut WsStream) {
    let result = timeout(TIMEOUT, async {
        while let Some(frame) = ws.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => return,
                Ok(_) => {}
            }
        }
    })
    .await;
    assert!(result.is_ok(), "server never closed the socket");
}

// ── Router ──

#[tokio::test]
async fn ping_returns_pong() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    let seq = client.ping().unwrap();
    let resp = client.next_response(TIMEOUT).await.unwrap();
    assert!(resp.is_ok());
    assert_eq!(resp.seq_reply, seq);
    let data = resp.data.unwrap();
    assert_eq!(data["text"], "pong");
    assert!(data["server_time"].is_number());
}

#[tokio::test]
async fn empty_action_is_no_action() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    let _ = client.send_message("", serde_json::Map::new()).unwrap();
    let resp = client.next_response(TIMEOUT).await.unwrap();
    assert_eq!(resp.error_id(), Some(NO_ACTION));
}

#[tokio::test]
async fn unknown_action_is_bad_action() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    let _ = client.send_message("junk", serde_json::Map::new()).unwrap();
    let resp = client.next_response(TIMEOUT).await.unwrap();
    assert_eq!(resp.error_id(), Some(BAD_ACTION));
}

#[tokio::test]
async fn zero_sequence_is_bad_sequence() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    client.send_request(r#"{"seq":0,"action":"ping"}"#).unwrap();
    let resp = client.next_response(TIMEOUT).await.unwrap();
    assert_eq!(resp.seq_reply, 0);
    assert_eq!(resp.error_id(), Some(BAD_SEQUENCE));
}

#[tokio::test]
async fn replayed_sequence_is_rejected_then_recovers() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    client.send_request(r#"{"seq":5,"action":"ping"}"#).unwrap();
    client.send_request(r#"{"seq":5,"action":"ping"}"#).unwrap();
    client.send_request(r#"{"seq":6,"action":"ping"}"#).unwrap();

    assert!(client.next_response(TIMEOUT).await.unwrap().is_ok());
    let replay = client.next_response(TIMEOUT).await.unwrap();
    assert_eq!(replay.error_id(), Some(BAD_SEQUENCE));
    let next = client.next_response(TIMEOUT).await.unwrap();
    assert!(next.is_ok());
    assert_eq!(next.seq_reply, 6);
}

#[tokio::test]
async fn user_typing_without_channel_is_invalid_param() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    let _ = client.user_typing("", "").unwrap();
    let resp = client.next_response(TIMEOUT).await.unwrap();
    assert_eq!(resp.error_id(), Some(INVALID_PARAM));
    assert_eq!(resp.error.unwrap().detailed_error, "");
}

#[tokio::test]
async fn malformed_frame_keeps_connection_open() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    client.send_request("{{{{").unwrap();
    let resp = client.next_response(TIMEOUT).await.unwrap();
    assert_eq!(resp.error_id(), Some(NO_ACTION));

    let _ = client.ping().unwrap();
    assert!(client.next_response(TIMEOUT).await.unwrap().is_ok());
    assert!(client.is_connected());
}

// ── Events ──

#[tokio::test]
async fn hello_carries_connection_id() {
    let ts = boot().await;
    let mut ws = ts.raw("tok-alice", None).await;
    let hello = next_json(&mut ws).await;
    assert_eq!(hello["event"], "hello");
    assert_eq!(hello["broadcast"]["user_id"], "alice");
    let id = hello["data"]["connection_id"].as_str().unwrap();
    assert!(ConnectionId::parse(id).is_some());
    assert!(hello["data"]["server_version"].is_string());
}

#[tokio::test]
async fn channel_event_reaches_member() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    ts.server.hub().publish(
        WebSocketEvent::new(EVENT_TYPING, "", "c1", "", ["somerandomid".to_string()])
            .with("user_id", "X"),
    );

    let event = client.next_event_named(EVENT_TYPING, Duration::from_secs(1)).await;
    let event = event.expect("typing event within 1s");
    assert_eq!(event.data["user_id"], "X");
    assert_eq!(event.broadcast.channel_id, "c1");
}

#[tokio::test]
async fn channel_event_skips_non_member() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    ts.server.hub().publish(
        WebSocketEvent::new(EVENT_TYPING, "", "c2", "", ["somerandomid".to_string()])
            .with("user_id", "X"),
    );

    assert!(client.next_event_named(EVENT_TYPING, Duration::from_secs(1)).await.is_none());
}

#[tokio::test]
async fn omitted_user_gets_nothing() {
    let ts = boot().await;
    let mut alice = ts.connected("tok-alice").await;
    let mut bob = ts.connected("tok-bob").await;

    ts.server
        .hub()
        .publish(WebSocketEvent::new("custom", "", "", "", ["alice".to_string()]).with("n", 1));

    assert!(bob.next_event_named("custom", TIMEOUT).await.is_some());
    assert!(alice.next_event_named("custom", QUIET).await.is_none());
}

#[tokio::test]
async fn user_typing_notifies_other_members() {
    let ts = boot().await;
    let mut alice = ts.connected("tok-alice").await;
    let mut bob = ts.connected("tok-bob").await;

    let seq = alice.user_typing("c1", "root-post").unwrap();
    let resp = alice.next_response(TIMEOUT).await.unwrap();
    assert!(resp.is_ok());
    assert_eq!(resp.seq_reply, seq);

    let event = bob.next_event_named(EVENT_TYPING, TIMEOUT).await.unwrap();
    assert_eq!(event.data["user_id"], "alice");
    assert_eq!(event.data["parent_id"], "root-post");
    assert!(event.broadcast.omit_users.contains("alice"));

    assert!(alice.next_event_named(EVENT_TYPING, QUIET).await.is_none());
}

#[tokio::test]
async fn events_arrive_in_publish_order() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    for n in 0..20 {
        ts.server
            .hub()
            .publish(WebSocketEvent::new("tick", "", "", "", Vec::new()).with("n", n));
    }
    for n in 0..20 {
        let event = client.next_event_named("tick", TIMEOUT).await.unwrap();
        assert_eq!(event.data["n"], n);
    }
}

#[tokio::test]
async fn send_to_user_reaches_every_device() {
    let ts = boot().await;
    let mut phone = ts.connected("tok-bob").await;
    let mut laptop = ts.connected("tok-bob").await;
    let mut alice = ts.connected("tok-alice").await;

    ts.server
        .hub()
        .send_to_user("bob", WebSocketEvent::new("direct", "", "", "", Vec::new()));

    assert!(phone.next_event_named("direct", TIMEOUT).await.is_some());
    assert!(laptop.next_event_named("direct", TIMEOUT).await.is_some());
    assert!(alice.next_event_named("direct", QUIET).await.is_none());
}

// ── Lifecycle ──

#[tokio::test]
async fn close_connect_listen_resets_sequence() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;

    assert_eq!(client.ping().unwrap(), 1);
    assert_eq!(client.ping().unwrap(), 2);
    let _ = client.next_response(TIMEOUT).await.unwrap();
    let _ = client.next_response(TIMEOUT).await.unwrap();
    let first_id = client.connection_id();

    client.close().await;
    client.close().await;
    assert!(!client.is_connected());

    client.connect().await.unwrap();
    client.listen().unwrap();
    let _ = client.next_event_named("hello", TIMEOUT).await.unwrap();
    assert_ne!(client.connection_id(), first_id);

    assert_eq!(client.ping().unwrap(), 1);
    let resp = client.next_response(TIMEOUT).await.unwrap();
    assert!(resp.is_ok());
    assert_eq!(resp.seq_reply, 1);
}

#[tokio::test]
async fn close_deregisters_from_hub() {
    let ts = boot().await;
    let mut client = ts.connected("tok-alice").await;
    ts.wait_for_count(1).await;
    client.close().await;
    ts.wait_for_count(0).await;
}

#[tokio::test]
async fn bad_token_is_rejected() {
    let ts = boot().await;
    let mut client = ts.client("nope");
    let err = client.connect().await.unwrap_err();
    assert_matches!(
        err,
        ClientError::Connection(tungstenite::Error::Http(resp)) if resp.status() == 401
    );
}

#[tokio::test]
async fn resumed_connection_id_replaces_prior_socket() {
    let ts = boot().await;
    let id = ConnectionId::new();

    let mut first = ts.raw("tok-alice", Some(id.as_str())).await;
    let hello = next_json(&mut first).await;
    assert_eq!(hello["data"]["connection_id"], id.as_str());
    ts.wait_for_count(1).await;

    let mut second = ts.raw("tok-alice", Some(id.as_str())).await;
    let hello = next_json(&mut second).await;
    assert_eq!(hello["data"]["connection_id"], id.as_str());

    wait_closed(&mut first).await;
    ts.wait_for_count(1).await;
}

#[tokio::test]
async fn connection_limit_returns_503() {
    let ts = boot_with(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;
    let _alice = ts.connected("tok-alice").await;
    ts.wait_for_count(1).await;

    let err = ts.client("tok-bob").connect().await.unwrap_err();
    assert_matches!(
        err,
        ClientError::Connection(tungstenite::Error::Http(resp)) if resp.status() == 503
    );
}

#[tokio::test]
async fn full_queue_disconnects_only_that_connection() {
    let ts = boot_with(ServerConfig {
        send_queue_size: 4,
        ..ServerConfig::default()
    })
    .await;
    let mut alice = ts.connected("tok-alice").await;

    // Never reads after hello, so its queue fills.
    let mut slow = ts.raw("tok-slow", None).await;
    let _ = next_json(&mut slow).await;
    ts.wait_for_count(2).await;

    for n in 0..500 {
        ts.server
            .hub()
            .send_to_user("slow", WebSocketEvent::new("flood", "", "", "", Vec::new()).with("n", n));
    }
    ts.wait_for_count(1).await;
    wait_closed(&mut slow).await;

    ts.server
        .hub()
        .publish(WebSocketEvent::new("after", "", "", "", Vec::new()));
    assert!(alice.next_event_named("after", TIMEOUT).await.is_some());
    let _ = alice.ping().unwrap();
    assert!(alice.next_response(TIMEOUT).await.unwrap().is_ok());
}

#[tokio::test]
async fn silent_client_times_out() {
    let ts = boot_with(ServerConfig {
        heartbeat_interval_ms: 100,
        heartbeat_timeout_ms: 300,
        ..ServerConfig::default()
    })
    .await;

    // A raw socket that is never polled never answers Pings.
    let _silent = ts.raw("tok-alice", None).await;
    ts.wait_for_count(1).await;
    ts.wait_for_count(0).await;
}

/// Never answers within a test's lifetime.
struct StallHandler;

#[async_trait::async_trait]
impl ActionHandler for StallHandler {
    async fn handle(
        &self,
        _data: serde_json::Map<String, serde_json::Value>,
        _ctx: &ActionContext,
    ) -> Result<serde_json::Map<String, serde_json::Value>, RpcError> {
        sleep(Duration::from_secs(60)).await;
        Ok(serde_json::Map::new())
    }
}

#[tokio::test]
async fn closed_connection_abandons_in_flight_handler() {
    let config = ServerConfig {
        heartbeat_interval_ms: 100,
        heartbeat_timeout_ms: 300,
        ..ServerConfig::default()
    };
    let mut registry = ActionRegistry::new().with_timeout(Duration::from_secs(60));
    registry.register("stall", StallHandler);
    let auth = Arc::new(StaticTokenAuthenticator::default().with_token("tok-alice", "alice"));
    let server = HubServer::new(config, registry, auth, Arc::new(StaticMembership::new()));
    let (addr, _handle) = server.listen().await.unwrap();
    let ts = TestServer {
        server,
        url: format!("ws://{addr}/ws"),
    };

    let mut ws = ts.raw("tok-alice", None).await;
    let _ = next_json(&mut ws).await;
    ws.send(Message::Text(r#"{"seq":1,"action":"stall"}"#.into()))
        .await
        .unwrap();
    ts.wait_for_count(1).await;

    // The heartbeat closes the connection while the handler is still
    // sleeping; only the session itself removes it from the hub.
    ts.wait_for_count(0).await;
}

#[tokio::test]
async fn shutdown_closes_live_connections() {
    let ts = boot().await;
    let mut ws = ts.raw("tok-alice", None).await;
    let _ = next_json(&mut ws).await;

    ts.server.shutdown().shutdown();
    wait_closed(&mut ws).await;
}

// ── Statuses ──

#[tokio::test]
async fn statuses_track_live_connections() {
    let ts = boot().await;
    let mut alice = ts.connected("tok-alice").await;
    let mut bob = ts.connected("tok-bob").await;

    let _ = alice.get_statuses().unwrap();
    let data = alice.next_response(TIMEOUT).await.unwrap().data.unwrap();
    assert_eq!(data["alice"], "online");
    assert_eq!(data["bob"], "online");

    let _ = alice.get_statuses_by_ids(&["bob", "carol"]).unwrap();
    let data = alice.next_response(TIMEOUT).await.unwrap().data.unwrap();
    assert_eq!(data["bob"], "online");
    assert_eq!(data["carol"], "offline");

    bob.close().await;
    ts.wait_for_count(1).await;
    let _ = alice.get_statuses_by_ids(&["bob"]).unwrap();
    let data = alice.next_response(TIMEOUT).await.unwrap().data.unwrap();
    assert_eq!(data["bob"], "offline");
}

#[tokio::test]
async fn statuses_by_ids_requires_ids() {
    let ts = boot().await;
    let mut alice = ts.connected("tok-alice").await;

    let _ = alice.get_statuses_by_ids(&[]).unwrap();
    let resp = alice.next_response(TIMEOUT).await.unwrap();
    assert_eq!(resp.error_id(), Some(INVALID_PARAM));
}
