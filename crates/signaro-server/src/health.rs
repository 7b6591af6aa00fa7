//! `/health` endpoint.

use std::time::Instant;

use serde::Serialize;
use signaro_core::{PeerIdentity, SessionRegistry};

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Whether a controller is registered.
    pub controller_connected: bool,
    /// Number of registered clients.
    pub clients: usize,
    /// Registered client identities, sorted.
    pub client_ids: Vec<PeerIdentity>,
    /// Sessions still running, rejected ones included.
    pub sessions: usize,
}

/// Build a health response from the registry and the live session count.
pub fn health_check(
    start_time: Instant,
    registry: &SessionRegistry,
    sessions: usize,
) -> HealthResponse {
    let client_ids = registry.client_identities();
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        controller_connected: registry.has_controller(),
        clients: client_ids.len(),
        client_ids,
        sessions,
    }
}
