// Configuration store: router registry, WAN selection and health thresholds,
// persisted as one JSON document. Reads never fail; a missing or malformed
// file yields an empty default document.

use crate::error::StoreError;
use crate::models::{HealthLevel, RouterRegistration};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Admin choice of which interfaces count as WAN, and which one is the backup link.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WanSelection {
    #[serde(default)]
    pub wan: Vec<String>,
    #[serde(default)]
    pub backup: Option<String>,
}

impl WanSelection {
    pub fn is_empty(&self) -> bool {
        self.wan.is_empty() && self.backup.is_none()
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.wan.iter().any(|w| w == name) || self.is_backup(name)
    }

    pub fn is_backup(&self, name: &str) -> bool {
        self.backup.as_deref() == Some(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthThresholds {
    pub cpu_warning: f64,
    pub cpu_critical: f64,
    pub memory_warning: f64,
    pub memory_critical: f64,
    /// Offline router count at which the fleet snapshot turns `warning`.
    pub offline_routers_warning: usize,
    /// Down WAN count at which the WAN summary turns `warning`.
    pub wan_down_warning: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 70.0,
            cpu_critical: 90.0,
            memory_warning: 80.0,
            memory_critical: 95.0,
            offline_routers_warning: 1,
            wan_down_warning: 1,
        }
    }
}

impl HealthThresholds {
    pub fn cpu_level(&self, percent: f64) -> HealthLevel {
        band(percent, self.cpu_warning, self.cpu_critical)
    }

    pub fn memory_level(&self, percent: f64) -> HealthLevel {
        band(percent, self.memory_warning, self.memory_critical)
    }

    pub fn offline_level(&self, offline: usize) -> HealthLevel {
        count_level(offline, self.offline_routers_warning)
    }

    pub fn wan_level(&self, down: usize, total: usize) -> HealthLevel {
        if total > 0 && down >= total {
            return HealthLevel::Critical;
        }
        count_level(down, self.wan_down_warning)
    }
}

fn band(value: f64, warning: f64, critical: f64) -> HealthLevel {
    if value >= critical {
        HealthLevel::Critical
    } else if value >= warning {
        HealthLevel::Warning
    } else {
        HealthLevel::Normal
    }
}

fn count_level(count: usize, warning: usize) -> HealthLevel {
    if warning > 0 && count >= warning {
        HealthLevel::Warning
    } else {
        HealthLevel::Normal
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreDocument {
    pub routers: Vec<RouterRegistration>,
    pub default_router_id: Option<String>,
    pub wan_selection: WanSelection,
    pub thresholds: HealthThresholds,
}

pub struct ConfigStore {
    path: Option<PathBuf>,
    doc: RwLock<StoreDocument>,
}

impl ConfigStore {
    /// Load from `path`, falling back to an empty document on any read or parse error.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let doc = match std::fs::read_to_string(&path) {
            Ok(s) => match serde_json::from_str::<StoreDocument>(&s) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        operation = "store_open",
                        "malformed configuration store; using empty defaults"
                    );
                    StoreDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no configuration store yet; starting empty");
                StoreDocument::default()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    operation = "store_open",
                    "configuration store unreadable; using empty defaults"
                );
                StoreDocument::default()
            }
        };
        Self {
            path: Some(path),
            doc: RwLock::new(doc),
        }
    }

    /// Store that never touches disk (tests, embedders with their own persistence).
    pub fn in_memory(doc: StoreDocument) -> Self {
        Self {
            path: None,
            doc: RwLock::new(doc),
        }
    }

    pub fn snapshot(&self) -> StoreDocument {
        self.read(|d| d.clone())
    }

    pub fn routers(&self) -> Vec<RouterRegistration> {
        self.read(|d| d.routers.clone())
    }

    pub fn router(&self, id: &str) -> Option<RouterRegistration> {
        self.read(|d| d.routers.iter().find(|r| r.id == id).cloned())
    }

    /// Explicit default id first, then the first router flagged default, then the first router.
    pub fn default_router(&self) -> Option<RouterRegistration> {
        self.read(|d| {
            d.default_router_id
                .as_ref()
                .and_then(|id| d.routers.iter().find(|r| &r.id == id))
                .or_else(|| d.routers.iter().find(|r| r.is_default))
                .or_else(|| d.routers.first())
                .cloned()
        })
    }

    pub fn wan_selection(&self) -> WanSelection {
        self.read(|d| d.wan_selection.clone())
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.read(|d| d.thresholds.clone())
    }

    pub fn register(&self, router: RouterRegistration) -> Result<(), StoreError> {
        self.write(|d| {
            if d.routers.iter().any(|r| r.id == router.id) {
                return Err(StoreError::DuplicateRouter(router.id.clone()));
            }
            if router.is_default {
                d.default_router_id = Some(router.id.clone());
            }
            d.routers.push(router);
            Ok(())
        })
    }

    /// Replace a registration in place, keeping its position in the registry.
    pub fn update(&self, router: RouterRegistration) -> Result<(), StoreError> {
        self.write(|d| {
            let slot = d
                .routers
                .iter_mut()
                .find(|r| r.id == router.id)
                .ok_or_else(|| StoreError::UnknownRouter(router.id.clone()))?;
            if router.is_default {
                d.default_router_id = Some(router.id.clone());
            }
            *slot = router;
            Ok(())
        })
    }

    pub fn remove(&self, id: &str) -> Result<RouterRegistration, StoreError> {
        self.write(|d| {
            let idx = d
                .routers
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| StoreError::UnknownRouter(id.to_string()))?;
            if d.default_router_id.as_deref() == Some(id) {
                d.default_router_id = None;
            }
            Ok(d.routers.remove(idx))
        })
    }

    pub fn set_default(&self, id: &str) -> Result<(), StoreError> {
        self.write(|d| {
            if !d.routers.iter().any(|r| r.id == id) {
                return Err(StoreError::UnknownRouter(id.to_string()));
            }
            for r in &mut d.routers {
                r.is_default = r.id == id;
            }
            d.default_router_id = Some(id.to_string());
            Ok(())
        })
    }

    pub fn set_wan_selection(&self, selection: WanSelection) -> Result<(), StoreError> {
        self.write(|d| {
            d.wan_selection = selection;
            Ok(())
        })
    }

    pub fn set_thresholds(&self, thresholds: HealthThresholds) -> Result<(), StoreError> {
        self.write(|d| {
            d.thresholds = thresholds;
            Ok(())
        })
    }

    fn read<R>(&self, f: impl FnOnce(&StoreDocument) -> R) -> R {
        let guard = self
            .doc
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&guard)
    }

    /// Apply a mutation and persist it; the in-memory document is only replaced once the write succeeds.
    fn write<R>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self
            .doc
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut next = guard.clone();
        let out = f(&mut next)?;
        if let Some(path) = &self.path {
            persist(path, &next)?;
        }
        *guard = next;
        Ok(out)
    }
}

fn persist(path: &Path, doc: &StoreDocument) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(doc)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
