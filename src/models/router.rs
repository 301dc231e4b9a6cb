// Router registry, health status and history event models

use serde::{Deserialize, Serialize};

use super::HealthLevel;

fn default_api_port() -> u16 {
    8728
}

/// A configured router. Owned by the configuration store; the core only reads it.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouterRegistration {
    pub id: String,
    pub name: String,
    pub host: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default)]
    pub is_default: bool,
}

impl std::fmt::Debug for RouterRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterRegistration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .field("is_default", &self.is_default)
            .finish()
    }
}

/// Heartbeat state. `Unknown` only exists before the first check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unknown,
    Up,
    Down,
}

/// Current snapshot for one router; overwritten every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterHealthStatus {
    pub router_id: String,
    pub name: String,
    pub host: String,
    pub state: HealthState,
    pub connected: bool,
    pub identity: Option<String>,
    pub last_error: Option<String>,
    pub last_check: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterEventKind {
    Down,
    Recovered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterHistoryEvent {
    #[serde(rename = "type")]
    pub kind: RouterEventKind,
    pub router_id: String,
    pub router_name: String,
    pub host: String,
    pub error: Option<String>,
    pub timestamp: u64,
}

/// Fleet-wide heartbeat view published after every cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    pub routers: Vec<RouterHealthStatus>,
    pub online: usize,
    pub offline: usize,
    pub level: HealthLevel,
    pub timestamp: u64,
}
