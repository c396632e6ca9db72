//! Prometheus metrics recorder and `/metrics` rendering.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Fails if another global
/// recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Connections closed because their send queue was full (counter).
pub const WS_OVERFLOW_DISCONNECTS_TOTAL: &str = "ws_overflow_disconnects_total";
/// Connections closed by the heartbeat (counter).
pub const WS_HEARTBEAT_TIMEOUTS_TOTAL: &str = "ws_heartbeat_timeouts_total";
/// Events published to the hub (counter, labels: event).
pub const WS_EVENTS_PUBLISHED_TOTAL: &str = "ws_events_published_total";
/// Event deliveries enqueued (counter, labels: event).
pub const WS_EVENTS_DELIVERED_TOTAL: &str = "ws_events_delivered_total";
/// Requests routed (counter, labels: action).
pub const RPC_REQUESTS_TOTAL: &str = "rpc_requests_total";
/// Requests answered with an error (counter, labels: action, error_type).
pub const RPC_ERRORS_TOTAL: &str = "rpc_errors_total";
/// Handler duration (histogram, labels: action).
pub const RPC_REQUEST_DURATION_SECONDS: &str = "rpc_request_duration_seconds";
