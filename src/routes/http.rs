// GET handlers: version, fleet, connection

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;

use super::AppState;
use crate::models::{FleetSnapshot, RouterHistoryEvent};

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FleetResponse {
    snapshot: FleetSnapshot,
    /// Newest first.
    history: Vec<RouterHistoryEvent>,
}

/// GET /version: service name and version from Cargo.toml at build time.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/fleet: latest heartbeat snapshot plus the bounded event history.
pub(super) async fn fleet_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(FleetResponse {
        snapshot: state.fleet.snapshot(),
        history: state.fleet.history(),
    })
}

/// GET /api/connection: active session status.
pub(super) async fn connection_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.status().await)
}
