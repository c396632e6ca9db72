//! `HubServer`: Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use switchboard_core::ConnectionId;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::auth::{Authenticator, extract_token};
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::membership::ChannelMembership;
use crate::rpc::registry::ActionRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::hub::Hub;
use crate::websocket::session::{SessionDeps, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Hub handle for registration and fan-out.
    pub hub: Hub,
    /// Action table shared by every session.
    pub registry: Arc<ActionRegistry>,
    /// Resolves upgrade tokens to user ids.
    pub authenticator: Arc<dyn Authenticator>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder was installed.
    pub metrics_handle: Option<PrometheusHandle>,
}

/// The realtime hub server.
pub struct HubServer {
    config: Arc<ServerConfig>,
    registry: Arc<ActionRegistry>,
    authenticator: Arc<dyn Authenticator>,
    hub: Hub,
    hub_task: Option<JoinHandle<()>>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics_handle: Option<PrometheusHandle>,
}

impl HubServer {
    /// Create a server and start its hub. Must be called inside a Tokio
    /// runtime.
    pub fn new(
        config: ServerConfig,
        registry: ActionRegistry,
        authenticator: Arc<dyn Authenticator>,
        membership: Arc<dyn ChannelMembership>,
    ) -> Self {
        let (hub, hub_task) = Hub::start(membership);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            authenticator,
            hub,
            hub_task: Some(hub_task),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics_handle: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            registry: self.registry.clone(),
            authenticator: self.authenticator.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics_handle: self.metrics_handle.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    /// Triggering [`ShutdownCoordinator::shutdown`] stops accepting, closes
    /// every live connection and lets the task finish.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "hub server listening");

        let router = self.router();
        let token = self.shutdown.token();
        let hub = self.hub.clone();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    token.cancelled().await;
                    hub.shutdown();
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server exited with error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Get the hub handle.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Take the hub actor's task, for graceful shutdown. Returns `None`
    /// after the first call.
    pub fn take_hub_task(&mut self) -> Option<JoinHandle<()>> {
        self.hub_task.take()
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the action registry.
    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }
}

/// Query string accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
struct WsParams {
    token: Option<String>,
    connection_id: Option<String>,
}

/// GET /ws
///
/// Authenticates before looking at the upgrade headers, so a bad token is
/// always a 401.
async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(user_id) = extract_token(&headers, params.token.as_deref())
        .and_then(|token| state.authenticator.authenticate(token))
    else {
        debug!("rejecting upgrade: missing or invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    if state.shutdown.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    match state.hub.connection_count().await {
        Ok(count) if count < state.config.max_connections => {}
        Ok(count) => {
            warn!(count, max = state.config.max_connections, "connection limit reached");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        Err(_) => return StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }

    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let connection_id = params
        .connection_id
        .as_deref()
        .and_then(ConnectionId::parse)
        .unwrap_or_default();
    let deps = SessionDeps {
        hub: state.hub.clone(),
        registry: state.registry.clone(),
        config: state.config.clone(),
    };
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| run_ws_session(socket, connection_id, user_id, deps))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.connection_count().await.unwrap_or(0);
    Json(health::health_check(
        state.start_time,
        connections,
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
