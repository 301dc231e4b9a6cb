// Fleet health state machine and heartbeat cycle over every registered router.

use crate::client::{ConnectTarget, RouterClient, field, paths};
use crate::config::FleetConfig;
use crate::error::ClientError;
use crate::models::{
    FleetSnapshot, HealthState, RouterEventKind, RouterHealthStatus, RouterHistoryEvent,
    RouterRegistration, TelemetryEvent, now_millis,
};
use crate::ring::BoundedHistory;
use crate::store::ConfigStore;
use crate::telemetry::Broadcaster;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval, sleep, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Result of one heartbeat probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Up { identity: String },
    Down { error: String },
}

impl ProbeOutcome {
    pub fn is_up(&self) -> bool {
        matches!(self, ProbeOutcome::Up { .. })
    }
}

/// Next state and the edge event, if any. Repeated results never emit;
/// the first-ever failure does, the first-ever success does not.
pub fn transition(previous: HealthState, up: bool) -> (HealthState, Option<RouterEventKind>) {
    match (previous, up) {
        (HealthState::Up, true) | (HealthState::Unknown, true) => (HealthState::Up, None),
        (HealthState::Down, true) => (HealthState::Up, Some(RouterEventKind::Recovered)),
        (HealthState::Up, false) | (HealthState::Unknown, false) => {
            (HealthState::Down, Some(RouterEventKind::Down))
        }
        (HealthState::Down, false) => (HealthState::Down, None),
    }
}

pub struct FleetMonitor {
    client: Arc<dyn RouterClient>,
    store: Arc<ConfigStore>,
    broadcaster: Broadcaster,
    config: FleetConfig,
    statuses: RwLock<HashMap<String, RouterHealthStatus>>,
    history: RwLock<BoundedHistory<RouterHistoryEvent>>,
}

impl FleetMonitor {
    pub fn new(
        client: Arc<dyn RouterClient>,
        store: Arc<ConfigStore>,
        broadcaster: Broadcaster,
        config: FleetConfig,
    ) -> Self {
        let history = BoundedHistory::new(config.history_capacity);
        Self {
            client,
            store,
            broadcaster,
            config,
            statuses: RwLock::new(HashMap::new()),
            history: RwLock::new(history),
        }
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.config.probe_timeout_secs)
    }

    /// Connect and read identity within one probe deadline. An opened session
    /// is always closed, even when the identity call runs out the deadline.
    #[instrument(skip(self, router), fields(router = %router.id, host = %router.host))]
    pub async fn probe(&self, router: &RouterRegistration) -> ProbeOutcome {
        let limit = self.probe_timeout();
        let deadline = Instant::now() + limit;
        let timed_out = || ClientError::Timeout(limit.as_millis() as u64);
        let target = ConnectTarget::from(router);

        let result = match timeout_at(deadline, self.client.connect(&target, limit)).await {
            Err(_) => Err(timed_out()),
            Ok(Err(e)) => Err(e),
            Ok(Ok(session)) => {
                let rows = timeout_at(deadline, session.call(paths::IDENTITY, &[]))
                    .await
                    .unwrap_or_else(|_| Err(timed_out()));
                if timeout(CLOSE_TIMEOUT, session.close()).await.is_err() {
                    tracing::warn!("heartbeat session close timed out");
                }
                rows
            }
        };
        match result {
            Ok(rows) => ProbeOutcome::Up {
                identity: rows
                    .first()
                    .map(|r| field(r, "name"))
                    .filter(|name| !name.is_empty())
                    .unwrap_or(router.name.as_str())
                    .to_string(),
            },
            Err(e) => {
                tracing::debug!(error = %e, "heartbeat probe failed");
                ProbeOutcome::Down {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Fold one probe result into the status map and history.
    pub fn apply(
        &self,
        router: &RouterRegistration,
        outcome: ProbeOutcome,
        now: u64,
    ) -> Option<RouterHistoryEvent> {
        let mut statuses = self.statuses.write().unwrap_or_else(PoisonError::into_inner);
        let previous = statuses
            .get(&router.id)
            .map(|s| s.state)
            .unwrap_or_default();
        let (state, kind) = transition(previous, outcome.is_up());

        let (identity, error) = match outcome {
            ProbeOutcome::Up { identity } => (Some(identity), None),
            ProbeOutcome::Down { error } => (None, Some(error)),
        };
        statuses.insert(
            router.id.clone(),
            RouterHealthStatus {
                router_id: router.id.clone(),
                name: router.name.clone(),
                host: router.host.clone(),
                state,
                connected: state == HealthState::Up,
                identity,
                last_error: error.clone(),
                last_check: now,
            },
        );
        drop(statuses);

        let kind = kind?;
        let event = RouterHistoryEvent {
            kind,
            router_id: router.id.clone(),
            router_name: router.name.clone(),
            host: router.host.clone(),
            error: match kind {
                RouterEventKind::Down => error,
                RouterEventKind::Recovered => None,
            },
            timestamp: now,
        };
        match kind {
            RouterEventKind::Down => tracing::warn!(
                router = %router.id,
                host = %router.host,
                error = event.error.as_deref().unwrap_or(""),
                "router down"
            ),
            RouterEventKind::Recovered => {
                tracing::info!(router = %router.id, host = %router.host, "router recovered")
            }
        }
        self.history
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push_front(event.clone());
        Some(event)
    }

    /// One heartbeat cycle: probe every registered router concurrently, then
    /// fold all results and publish alerts and the fleet snapshot.
    pub async fn check_all(&self) -> FleetSnapshot {
        let routers = self.store.routers();
        let outcomes = join_all(routers.iter().map(|r| self.probe(r))).await;

        let now = now_millis();
        let events: Vec<RouterHistoryEvent> = routers
            .iter()
            .zip(outcomes)
            .filter_map(|(router, outcome)| self.apply(router, outcome, now))
            .collect();
        self.statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|id, _| routers.iter().any(|r| &r.id == id));

        for event in events {
            self.broadcaster.publish(TelemetryEvent::RouterAlert(event));
        }
        let snapshot = self.snapshot();
        tracing::debug!(
            online = snapshot.online,
            offline = snapshot.offline,
            "fleet heartbeat cycle complete"
        );
        self.broadcaster
            .publish(TelemetryEvent::FleetStatus(snapshot.clone()));
        snapshot
    }

    pub fn status(&self, router_id: &str) -> Option<RouterHealthStatus> {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(router_id)
            .cloned()
    }

    /// Statuses in registry order; routers not yet checked are omitted.
    pub fn statuses(&self) -> Vec<RouterHealthStatus> {
        let statuses = self.statuses.read().unwrap_or_else(PoisonError::into_inner);
        self.store
            .routers()
            .iter()
            .filter_map(|r| statuses.get(&r.id).cloned())
            .collect()
    }

    /// Newest first.
    pub fn history(&self) -> Vec<RouterHistoryEvent> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        let routers = self.statuses();
        let offline = routers
            .iter()
            .filter(|s| s.state == HealthState::Down)
            .count();
        let online = routers.iter().filter(|s| s.state == HealthState::Up).count();
        FleetSnapshot {
            level: self.store.thresholds().offline_level(offline),
            routers,
            online,
            offline,
            timestamp: now_millis(),
        }
    }

    /// Settle, then run a cycle every `interval_secs` until cancelled.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let settle = Duration::from_secs(self.config.settle_delay_secs);
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(settle) => {}
            }
            tracing::info!(
                interval_secs = self.config.interval_secs,
                routers = self.store.routers().len(),
                "fleet monitor started"
            );

            let mut tick = interval(Duration::from_secs(self.config.interval_secs));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = self.check_all() => {}
                        }
                    }
                }
            }
            tracing::info!("fleet monitor stopped");
        })
    }
}
