// Router resource sampling: CPU/memory load, threshold bands and bounded history.

use crate::client::{Record, field, field_u64};
use crate::models::{ResourceSample, SystemInfo};
use crate::ring::BoundedHistory;
use crate::store::HealthThresholds;

pub struct ResourceTracker {
    cpu: BoundedHistory<f64>,
    memory: BoundedHistory<f64>,
}

impl ResourceTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            cpu: BoundedHistory::new(capacity),
            memory: BoundedHistory::new(capacity),
        }
    }

    /// Build a sample from a `/system/resource` row and append it to the history.
    pub fn record(
        &mut self,
        r: &Record,
        thresholds: &HealthThresholds,
        timestamp: u64,
    ) -> ResourceSample {
        let cpu_load = field_u64(r, "cpu-load") as f64;
        let memory_total = field_u64(r, "total-memory");
        let memory_free = field_u64(r, "free-memory").min(memory_total);
        let memory_used_percent = if memory_total > 0 {
            (memory_total - memory_free) as f64 / memory_total as f64 * 100.0
        } else {
            0.0
        };

        self.cpu.push_back(cpu_load);
        self.memory.push_back(memory_used_percent);

        ResourceSample {
            timestamp,
            cpu_load,
            memory_total,
            memory_free,
            memory_used_percent,
            uptime: field(r, "uptime").to_string(),
            cpu_level: thresholds.cpu_level(cpu_load),
            memory_level: thresholds.memory_level(memory_used_percent),
            cpu_history: self.cpu.to_vec(),
            memory_history: self.memory.to_vec(),
        }
    }
}

/// Identity row plus resource row, read once per connect.
pub fn system_info(identity: Option<&Record>, resource: Option<&Record>) -> SystemInfo {
    let get = |r: Option<&Record>, key: &str| r.map(|r| field(r, key).to_string()).unwrap_or_default();
    SystemInfo {
        identity: get(identity, "name"),
        board_name: get(resource, "board-name"),
        version: get(resource, "version"),
        architecture: get(resource, "architecture-name"),
        uptime: get(resource, "uptime"),
    }
}
