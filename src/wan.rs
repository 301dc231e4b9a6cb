// WAN link classification and cumulative up/down records.

use crate::client::{Record, field, field_bool};
use crate::models::{InterfaceInfo, WanInterfaceRecord, WanSummary};
use crate::store::{HealthThresholds, WanSelection};
use std::collections::BTreeMap;
use std::time::Duration;

/// Name/comment fragments that mark an upstream link when no admin selection exists.
const WAN_HINTS: &[&str] = &["wan", "pppoe", "lte", "isp", "internet", "uplink"];

/// Admin selection wins; heuristics apply only when nothing is selected.
pub fn is_wan(name: &str, kind: &str, comment: &str, selection: &WanSelection) -> bool {
    if !selection.is_empty() {
        return selection.is_selected(name);
    }
    let name = name.to_lowercase();
    let kind = kind.to_lowercase();
    let comment = comment.to_lowercase();
    WAN_HINTS
        .iter()
        .any(|h| name.contains(h) || kind.contains(h) || comment.contains(h))
}

pub fn interface_info(r: &Record, selection: &WanSelection) -> InterfaceInfo {
    let name = field(r, "name");
    let kind = field(r, "type");
    let comment = field(r, "comment");
    InterfaceInfo {
        name: name.to_string(),
        kind: kind.to_string(),
        mac_address: field(r, "mac-address").to_string(),
        running: field_bool(r, "running"),
        disabled: field_bool(r, "disabled"),
        comment: comment.to_string(),
        wan: is_wan(name, kind, comment, selection),
    }
}

/// Per-link history for the active router. Records are created on first
/// detection and kept for as long as the tracker lives.
#[derive(Debug, Default)]
pub struct WanTracker {
    records: BTreeMap<String, WanInterfaceRecord>,
}

impl WanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&WanInterfaceRecord> {
        self.records.get(name)
    }

    /// Fold one WAN check. `interval` is the nominal check cadence, charged as downtime when down.
    pub fn observe(&mut self, name: &str, up: bool, backup: bool, interval: Duration, now: u64) {
        let record = self
            .records
            .entry(name.to_string())
            .or_insert_with(|| WanInterfaceRecord {
                name: name.to_string(),
                up,
                backup,
                uptime_percent: 100.0,
                downtime_secs: 0,
                failure_count: 0,
                checks: 0,
                up_checks: 0,
                last_check: now,
            });

        let first = record.checks == 0;
        if !up && (first || record.up) {
            record.failure_count += 1;
            tracing::warn!(interface = name, "WAN link down");
        } else if up && !first && !record.up {
            tracing::info!(interface = name, "WAN link recovered");
        }

        record.checks += 1;
        if up {
            record.up_checks += 1;
        } else {
            record.downtime_secs += interval.as_secs();
        }
        record.up = up;
        record.backup = backup;
        record.uptime_percent = record.up_checks as f64 / record.checks as f64 * 100.0;
        record.last_check = now;
    }

    /// Fold a full interface poll and summarize every known WAN record.
    pub fn update(
        &mut self,
        interfaces: &[InterfaceInfo],
        selection: &WanSelection,
        thresholds: &HealthThresholds,
        interval: Duration,
        now: u64,
    ) -> WanSummary {
        for iface in interfaces.iter().filter(|i| i.wan) {
            let up = iface.running && !iface.disabled;
            self.observe(&iface.name, up, selection.is_backup(&iface.name), interval, now);
        }
        self.summary(thresholds)
    }

    pub fn summary(&self, thresholds: &HealthThresholds) -> WanSummary {
        let interfaces: Vec<WanInterfaceRecord> = self.records.values().cloned().collect();
        let up = interfaces.iter().filter(|r| r.up).count();
        let down = interfaces.len() - up;
        WanSummary {
            level: thresholds.wan_level(down, interfaces.len()),
            interfaces,
            up,
            down,
        }
    }
}
