// Interface, traffic and WAN models

use serde::{Deserialize, Serialize};

use super::HealthLevel;

/// Static-ish view of one router interface (interfaces task).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub mac_address: String,
    pub running: bool,
    pub disabled: bool,
    pub comment: String,
    pub wan: bool,
}

/// Per-interface throughput for one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceRate {
    pub name: String,
    pub rx_mbps: f64,
    pub tx_mbps: f64,
    pub running: bool,
}

/// One point in the global traffic series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficPoint {
    pub tick: u64,
    pub rx_mbps: f64,
    pub tx_mbps: f64,
}

/// Packet/error/drop sums over interfaces running in this poll.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficTotals {
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_drops: u64,
    pub tx_drops: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSample {
    pub timestamp: u64,
    pub rx_mbps: f64,
    pub tx_mbps: f64,
    pub peak_rx_mbps: f64,
    pub peak_tx_mbps: f64,
    /// Sum over selected WAN interfaces that produced a rate this tick.
    pub wan_rx_mbps: f64,
    pub wan_tx_mbps: f64,
    pub interfaces: Vec<InterfaceRate>,
    pub totals: TrafficTotals,
    pub history: Vec<TrafficPoint>,
}

/// Cumulative up/down record for one WAN link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WanInterfaceRecord {
    pub name: String,
    pub up: bool,
    pub backup: bool,
    pub uptime_percent: f64,
    pub downtime_secs: u64,
    pub failure_count: u32,
    pub checks: u64,
    pub up_checks: u64,
    pub last_check: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WanSummary {
    pub interfaces: Vec<WanInterfaceRecord>,
    pub up: usize,
    pub down: usize,
    pub level: HealthLevel,
}
