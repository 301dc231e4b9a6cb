// Named snapshots pushed to telemetry subscribers

use serde::{Deserialize, Serialize};

use super::{
    ConnectionStatus, DeviceRecord, FleetSnapshot, InterfaceInfo, ResourceSample,
    RouterHistoryEvent, SecuritySummary, SystemInfo, TrafficSample, WanSummary,
};

/// Wire shape: `{"type": "...", "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TelemetryEvent {
    ConnectionStatus(ConnectionStatus),
    SystemInfo(SystemInfo),
    Interfaces(Vec<InterfaceInfo>),
    Devices(Vec<DeviceRecord>),
    Traffic(TrafficSample),
    Resources(ResourceSample),
    Wan(WanSummary),
    Security(SecuritySummary),
    Cameras(Vec<DeviceRecord>),
    RouterAlert(RouterHistoryEvent),
    FleetStatus(FleetSnapshot),
}

impl TelemetryEvent {
    /// Snapshot name, used as a log field.
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::ConnectionStatus(_) => "connection_status",
            TelemetryEvent::SystemInfo(_) => "system_info",
            TelemetryEvent::Interfaces(_) => "interfaces",
            TelemetryEvent::Devices(_) => "devices",
            TelemetryEvent::Traffic(_) => "traffic",
            TelemetryEvent::Resources(_) => "resources",
            TelemetryEvent::Wan(_) => "wan",
            TelemetryEvent::Security(_) => "security",
            TelemetryEvent::Cameras(_) => "cameras",
            TelemetryEvent::RouterAlert(_) => "router_alert",
            TelemetryEvent::FleetStatus(_) => "fleet_status",
        }
    }
}
