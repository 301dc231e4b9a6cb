// Telemetry broadcaster: fan-out of named snapshots to push subscribers.
// Keeps the latest snapshot per name so late subscribers start with current state.

use crate::models::TelemetryEvent;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};

/// Rate limit for the "no receivers" notice (avoid logging every tick when nobody is subscribed).
const NO_RECEIVERS_WARN_INTERVAL: Duration = Duration::from_secs(60);

/// Snapshots that outlive the active session.
const FLEET_SCOPED: &[&str] = &["connection_status", "fleet_status"];

#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Inner>,
}

struct Inner {
    tx: broadcast::Sender<TelemetryEvent>,
    latest: RwLock<BTreeMap<&'static str, TelemetryEvent>>,
    last_no_receivers_warn: Mutex<Option<Instant>>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                tx,
                latest: RwLock::new(BTreeMap::new()),
                last_no_receivers_warn: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.inner.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// Cache (except one-off alerts) and push to every subscriber.
    pub fn publish(&self, event: TelemetryEvent) {
        let name = event.name();
        if !matches!(event, TelemetryEvent::RouterAlert(_)) {
            self.inner
                .latest
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(name, event.clone());
        }

        if self.inner.tx.send(event).is_err() {
            let mut last = self
                .inner
                .last_no_receivers_warn
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.is_none_or(|t| t.elapsed() >= NO_RECEIVERS_WARN_INTERVAL) {
                tracing::debug!(
                    operation = "broadcast_telemetry",
                    snapshot = name,
                    "No active subscribers; broadcast channel has no receivers"
                );
                *last = Some(Instant::now());
            }
        }
    }

    /// Latest snapshot per name, in name order.
    pub fn latest(&self) -> Vec<TelemetryEvent> {
        self.inner
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn latest_named(&self, name: &str) -> Option<TelemetryEvent> {
        self.inner
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Drop cached snapshots that belong to the torn-down session.
    pub fn clear_session(&self) {
        self.inner
            .latest
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|name, _| FLEET_SCOPED.contains(name));
    }
}
