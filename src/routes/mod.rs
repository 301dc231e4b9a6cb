// HTTP + WebSocket push surface

mod http;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::fleet::FleetMonitor;
use crate::session::SessionController;
use crate::telemetry::Broadcaster;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) broadcaster: Broadcaster,
    pub(crate) fleet: Arc<FleetMonitor>,
    pub(crate) session: Arc<SessionController>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
}

pub fn app(
    broadcaster: Broadcaster,
    fleet: Arc<FleetMonitor>,
    session: Arc<SessionController>,
    ws_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        broadcaster,
        fleet,
        session,
        ws_connections,
    };
    Router::new()
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/fleet", get(http::fleet_handler)) // GET /api/fleet
        .route("/api/connection", get(http::connection_handler)) // GET /api/connection
        .route("/ws/telemetry", get(ws::ws_telemetry)) // WS /ws/telemetry
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
