// Domain models (serialized camelCase on the telemetry wire)

mod device;
mod event;
mod network;
mod router;
mod security;
mod system;

pub use device::{DetectionMethod, DeviceRecord};
pub use event::TelemetryEvent;
pub use network::{
    InterfaceInfo, InterfaceRate, TrafficPoint, TrafficSample, TrafficTotals, WanInterfaceRecord,
    WanSummary,
};
pub use router::{
    FleetSnapshot, HealthState, RouterEventKind, RouterHealthStatus, RouterHistoryEvent,
    RouterRegistration,
};
pub use security::{SecurityEvent, SecurityEventKind, SecuritySummary, Severity};
pub use system::{ConnectionStatus, HealthLevel, ResourceSample, SystemInfo};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
