//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;

use crate::registry::RegistrySnapshot;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Open WebSocket connections, authenticated or not.
    pub connections: usize,
    /// Registered seekers.
    pub seekers: usize,
    /// Registered responders.
    pub responders: usize,
    /// Established pairings.
    pub pairings: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, registry: RegistrySnapshot) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        seekers: registry.seekers,
        responders: registry.responders,
        pairings: registry.pairings,
    }
}
