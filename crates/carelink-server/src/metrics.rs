//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::ServerError;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `/metrics`. Call once at startup,
/// before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// WebSocket connections accepted (counter, labels: role).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections (counter, labels: role).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Open WebSocket sessions (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Upgrades refused at the connection cap (counter).
pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
/// Session duration (histogram, labels: role).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Connections closed for auth reasons (counter, labels: reason).
pub const AUTH_REJECTIONS_TOTAL: &str = "auth_rejections_total";
/// Inbound frames (counter, labels: type).
pub const FRAMES_RECEIVED_TOTAL: &str = "frames_received_total";
/// Messages or pairing requests that could not be served (counter, labels: reason).
pub const ROUTING_FAILURES_TOTAL: &str = "routing_failures_total";
/// Frames dropped at a full or closed send queue (counter, labels: frame).
pub const DELIVERY_DROPS_TOTAL: &str = "delivery_drops_total";
/// Pairings created (counter).
pub const PAIRINGS_CREATED_TOTAL: &str = "pairings_created_total";
/// Registered seekers (gauge).
pub const SEEKERS_ACTIVE: &str = "seekers_active";
/// Registered responders (gauge).
pub const RESPONDERS_ACTIVE: &str = "responders_active";
