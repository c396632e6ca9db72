//! `WebSocketClient`: thin client over `tokio-tungstenite`.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use switchboard_core::model::event::EVENT_HELLO;
use switchboard_core::{WebSocketEvent, WebSocketMessage, WebSocketRequest, WebSocketResponse};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::errors::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close` waits for the close handshake before abandoning it.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// One open transport.
struct Transport {
    out_tx: mpsc::UnboundedSender<Message>,
    writer: JoinHandle<()>,
    /// Held until [`WebSocketClient::listen`] starts the reader.
    stream: Option<SplitStream<WsStream>>,
    reader: Option<JoinHandle<()>>,
}

/// Client handle for one logical session with the hub.
///
/// The handle survives `close` → `connect` cycles. Each `connect` opens a
/// fresh transport, restarts the request sequence at 1 and discards anything
/// still buffered from the previous transport.
pub struct WebSocketClient {
    url: String,
    token: String,
    seq: i64,
    transport: Option<Transport>,
    connection_id: Arc<Mutex<Option<String>>>,
    responses_tx: mpsc::UnboundedSender<WebSocketResponse>,
    responses_rx: mpsc::UnboundedReceiver<WebSocketResponse>,
    events_tx: mpsc::UnboundedSender<WebSocketEvent>,
    events_rx: mpsc::UnboundedReceiver<WebSocketEvent>,
}

impl WebSocketClient {
    /// Create a disconnected client for `url` (e.g. `ws://127.0.0.1:8065/ws`).
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            url: url.into(),
            token: token.into(),
            seq: 1,
            transport: None,
            connection_id: Arc::new(Mutex::new(None)),
            responses_tx,
            responses_rx,
            events_tx,
            events_rx,
        }
    }

    /// Open the transport. Closes any transport that is still open first.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.close().await;

        let request = self.build_request()?;
        let (ws, _) = connect_async(request).await?;
        let (sink, stream) = ws.split();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(sink, out_rx));

        while self.responses_rx.try_recv().is_ok() {}
        while self.events_rx.try_recv().is_ok() {}
        *self.connection_id.lock() = None;
        self.seq = 1;
        self.transport = Some(Transport {
            out_tx,
            writer,
            stream: Some(stream),
            reader: None,
        });
        debug!(url = %self.url, "connected");
        Ok(())
    }

    /// Send a close frame and drop the transport. No-op when not connected.
    pub async fn close(&mut self) {
        let Some(Transport {
            out_tx,
            mut writer,
            stream: _,
            reader,
        }) = self.transport.take()
        else {
            return;
        };

        let _ = out_tx.send(Message::Close(None));
        drop(out_tx);
        if timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
            writer.abort();
        }
        if let Some(mut reader) = reader {
            if timeout(CLOSE_TIMEOUT, &mut reader).await.is_err() {
                reader.abort();
            }
        }
        debug!(url = %self.url, "closed");
    }

    /// Start sorting inbound frames into the response and event streams.
    /// Calling it again while listening is a no-op.
    pub fn listen(&mut self) -> Result<(), ClientError> {
        let transport = self.transport.as_mut().ok_or(ClientError::NotConnected)?;
        let Some(stream) = transport.stream.take() else {
            return Ok(());
        };
        transport.reader = Some(tokio::spawn(read_loop(
            stream,
            self.responses_tx.clone(),
            self.events_tx.clone(),
            self.connection_id.clone(),
        )));
        Ok(())
    }

    /// Whether a transport is open and neither side has hung up.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| {
            !t.writer.is_finished() && t.reader.as_ref().is_none_or(|r| !r.is_finished())
        })
    }

    /// Connection id announced by the server's `hello` event, once received.
    pub fn connection_id(&self) -> Option<String> {
        self.connection_id.lock().clone()
    }

    /// Sequence number the next request will carry.
    pub fn next_seq(&self) -> i64 {
        self.seq
    }

    /// Send `action` with `data`, returning the sequence number used.
    pub fn send_message(&mut self, action: &str, data: Map<String, Value>) -> Result<i64, ClientError> {
        let seq = self.seq;
        let json = serde_json::to_string(&WebSocketRequest::new(seq, action, data))?;
        self.send_request(json)?;
        self.seq += 1;
        Ok(seq)
    }

    /// Send a raw text frame without touching the sequence counter.
    pub fn send_request(&self, text: impl Into<String>) -> Result<(), ClientError> {
        let transport = self.transport.as_ref().ok_or(ClientError::NotConnected)?;
        transport
            .out_tx
            .send(Message::text(text.into()))
            .map_err(|_| ClientError::NotConnected)
    }

    /// `ping`
    pub fn ping(&mut self) -> Result<i64, ClientError> {
        self.send_message("ping", Map::new())
    }

    /// `user_typing` in `channel_id`, optionally within thread `parent_id`.
    pub fn user_typing(&mut self, channel_id: &str, parent_id: &str) -> Result<i64, ClientError> {
        let mut data = Map::new();
        let _ = data.insert("channel_id".into(), channel_id.into());
        let _ = data.insert("parent_id".into(), parent_id.into());
        self.send_message("user_typing", data)
    }

    /// `get_statuses`
    pub fn get_statuses(&mut self) -> Result<i64, ClientError> {
        self.send_message("get_statuses", Map::new())
    }

    /// `get_statuses_by_ids`
    pub fn get_statuses_by_ids(&mut self, user_ids: &[&str]) -> Result<i64, ClientError> {
        let mut data = Map::new();
        let _ = data.insert("user_ids".into(), user_ids.iter().copied().map(Value::from).collect());
        self.send_message("get_statuses_by_ids", data)
    }

    /// Next response, or `None` if nothing arrives within `wait`.
    pub async fn next_response(&mut self, wait: Duration) -> Option<WebSocketResponse> {
        timeout(wait, self.responses_rx.recv()).await.ok().flatten()
    }

    /// Next event of any kind, or `None` if nothing arrives within `wait`.
    pub async fn next_event(&mut self, wait: Duration) -> Option<WebSocketEvent> {
        timeout(wait, self.events_rx.recv()).await.ok().flatten()
    }

    /// Next event named `event`, skipping others, within `wait`.
    pub async fn next_event_named(&mut self, event: &str, wait: Duration) -> Option<WebSocketEvent> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let ev = self.next_event(remaining).await?;
            if ev.event == event {
                return Some(ev);
            }
        }
    }

    fn build_request(
        &self,
    ) -> Result<tokio_tungstenite::tungstenite::handshake::client::Request, ClientError> {
        let mut request = self.url.as_str().into_client_request()?;
        if !self.token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
            let _ = request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }
}

async fn write_loop(mut sink: SplitSink<WsStream, Message>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            debug!(error = %e, "write failed");
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    responses: mpsc::UnboundedSender<WebSocketResponse>,
    events: mpsc::UnboundedSender<WebSocketEvent>,
    connection_id: Arc<Mutex<Option<String>>>,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "read failed");
                break;
            }
        };
        match WebSocketMessage::from_json(&text) {
            Some(WebSocketMessage::Response(resp)) => {
                let _ = responses.send(resp);
            }
            Some(WebSocketMessage::Event(event)) => {
                if event.event == EVENT_HELLO {
                    if let Some(id) = event.data.get("connection_id").and_then(Value::as_str) {
                        *connection_id.lock() = Some(id.to_owned());
                    }
                }
                let _ = events.send(event);
            }
            None => warn!(len = text.len(), "unrecognized frame"),
        }
    }
}
