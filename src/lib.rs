// Router fleet monitor: active-router telemetry, fleet heartbeat and push surface

pub mod app;
pub mod bandwidth;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod fleet;
pub mod logging;
pub mod models;
pub mod resources;
pub mod ring;
pub mod routes;
pub mod scheduler;
pub mod security;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod wan;
