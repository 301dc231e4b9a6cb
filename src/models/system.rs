// Router identity and resource models

use serde::{Deserialize, Serialize};

/// Severity band derived from configured warning/critical thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    #[default]
    Normal,
    Warning,
    Critical,
}

/// Published once after connecting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub identity: String,
    pub board_name: String,
    pub version: String,
    pub architecture: String,
    pub uptime: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSample {
    pub timestamp: u64,
    pub cpu_load: f64,
    pub memory_total: u64,
    pub memory_free: u64,
    pub memory_used_percent: f64,
    pub uptime: String,
    pub cpu_level: HealthLevel,
    pub memory_level: HealthLevel,
    pub cpu_history: Vec<f64>,
    pub memory_history: Vec<f64>,
}

/// Active-session state pushed on connect, disconnect and connect failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub router_id: Option<String>,
    pub router_name: Option<String>,
    pub host: Option<String>,
    pub connected_at: Option<u64>,
    pub error: Option<String>,
}
