// Polling scheduler for the active router: seven independent periodic tasks.
//
// Tick policy: a failed tick (error or panic) is logged and dropped. Nothing it
// would have written is touched, so every component keeps its last good state
// until the task's next scheduled tick succeeds. Ticks of one task never overlap.

use crate::bandwidth::{BandwidthEngine, InterfaceCounters};
use crate::classifier::{Classifier, Lease, arp_macs};
use crate::client::{Record, RouterSession, field, paths};
use crate::config::{HistoryConfig, PollingConfig};
use crate::error::PollError;
use crate::models::{RouterRegistration, TelemetryEvent, now_millis};
use crate::resources::ResourceTracker;
use crate::security;
use crate::store::ConfigStore;
use crate::telemetry::Broadcaster;
use crate::wan::{self, WanTracker};
use futures_util::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollTask {
    Traffic,
    Resources,
    Interfaces,
    Devices,
    Logs,
    Wan,
    Cameras,
}

impl PollTask {
    pub const ALL: [PollTask; 7] = [
        PollTask::Traffic,
        PollTask::Resources,
        PollTask::Interfaces,
        PollTask::Devices,
        PollTask::Logs,
        PollTask::Wan,
        PollTask::Cameras,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PollTask::Traffic => "traffic",
            PollTask::Resources => "resources",
            PollTask::Interfaces => "interfaces",
            PollTask::Devices => "devices",
            PollTask::Logs => "logs",
            PollTask::Wan => "wan",
            PollTask::Cameras => "cameras",
        }
    }

    pub fn period(self, config: &PollingConfig) -> Duration {
        let ms = match self {
            PollTask::Traffic => config.traffic_ms,
            PollTask::Resources => config.resources_ms,
            PollTask::Interfaces => config.interfaces_ms,
            PollTask::Devices => config.devices_ms,
            PollTask::Logs => config.logs_ms,
            PollTask::Wan => config.wan_ms,
            PollTask::Cameras => config.cameras_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Everything the tasks of one session read and write. Built per connect, so
/// counters from a previous router never leak into the next one.
pub struct PollContext {
    pub router: RouterRegistration,
    session: Arc<dyn RouterSession>,
    store: Arc<ConfigStore>,
    classifier: Arc<Classifier>,
    broadcaster: Broadcaster,
    polling: PollingConfig,
    history: HistoryConfig,
    connected: AtomicBool,
    bandwidth: Mutex<BandwidthEngine>,
    resources: Mutex<ResourceTracker>,
    wan: Arc<Mutex<WanTracker>>,
}

pub struct PollContextDeps {
    pub router: RouterRegistration,
    pub session: Arc<dyn RouterSession>,
    pub store: Arc<ConfigStore>,
    pub classifier: Arc<Classifier>,
    pub broadcaster: Broadcaster,
    pub polling: PollingConfig,
    pub history: HistoryConfig,
    /// WAN records survive reconnects to the same router, so the caller owns them.
    pub wan: Arc<Mutex<WanTracker>>,
}

impl PollContext {
    pub fn new(deps: PollContextDeps) -> Self {
        Self {
            bandwidth: Mutex::new(BandwidthEngine::new(deps.history.traffic_capacity)),
            resources: Mutex::new(ResourceTracker::new(deps.history.resource_capacity)),
            router: deps.router,
            session: deps.session,
            store: deps.store,
            classifier: deps.classifier,
            broadcaster: deps.broadcaster,
            polling: deps.polling,
            history: deps.history,
            connected: AtomicBool::new(true),
            wan: deps.wan,
        }
    }

    pub fn session(&self) -> &Arc<dyn RouterSession> {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Ticks starting after this return `NotConnected` without touching the session.
    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }

    async fn call(&self, path: &str) -> Result<Vec<Record>, PollError> {
        if !self.is_connected() {
            return Err(PollError::NotConnected);
        }
        Ok(self.session.call(path, &[]).await?)
    }

    /// Run one tick of `task`.
    #[instrument(skip(self, task), fields(router = %self.router.id, task = task.name()))]
    pub async fn tick(&self, task: PollTask) -> Result<(), PollError> {
        match task {
            PollTask::Traffic => self.poll_traffic().await,
            PollTask::Resources => self.poll_resources().await,
            PollTask::Interfaces => self.poll_interfaces().await,
            PollTask::Devices => self.poll_devices().await,
            PollTask::Logs => self.poll_logs().await,
            PollTask::Wan => self.poll_wan().await,
            PollTask::Cameras => self.poll_cameras().await,
        }
    }

    async fn poll_traffic(&self) -> Result<(), PollError> {
        let records = self.call(paths::INTERFACES).await?;
        let selection = self.store.wan_selection();
        let wan_names: HashSet<&str> = records
            .iter()
            .filter(|r| wan::is_wan(field(r, "name"), field(r, "type"), field(r, "comment"), &selection))
            .map(|r| field(r, "name"))
            .collect();
        let counters: Vec<InterfaceCounters> =
            records.iter().map(InterfaceCounters::from_record).collect();

        let sample = self
            .bandwidth
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ingest(
                &counters,
                |name| wan_names.contains(name),
                Instant::now().into_std(),
                now_millis(),
            );
        match sample {
            Some(sample) => self.broadcaster.publish(TelemetryEvent::Traffic(sample)),
            None => tracing::debug!("traffic counters primed"),
        }
        Ok(())
    }

    async fn poll_resources(&self) -> Result<(), PollError> {
        let records = self.call(paths::RESOURCE).await?;
        let row = records
            .first()
            .ok_or_else(|| PollError::Malformed("empty resource response".into()))?;
        let thresholds = self.store.thresholds();
        let sample = self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(row, &thresholds, now_millis());
        self.broadcaster.publish(TelemetryEvent::Resources(sample));
        Ok(())
    }

    async fn poll_interfaces(&self) -> Result<(), PollError> {
        let records = self.call(paths::INTERFACES).await?;
        let selection = self.store.wan_selection();
        let interfaces = records
            .iter()
            .map(|r| wan::interface_info(r, &selection))
            .collect();
        self.broadcaster
            .publish(TelemetryEvent::Interfaces(interfaces));
        Ok(())
    }

    async fn poll_devices(&self) -> Result<(), PollError> {
        let records = self.call(paths::DHCP_LEASES).await?;
        let leases: Vec<Lease> = records.iter().map(Lease::from_record).collect();
        let devices = self.classifier.devices(&leases);
        self.broadcaster.publish(TelemetryEvent::Devices(devices));
        Ok(())
    }

    async fn poll_logs(&self) -> Result<(), PollError> {
        let records = self.call(paths::LOG).await?;
        let lines = security::recent_lines(&records, self.polling.log_lines);
        let summary = security::analyze(&lines, self.history.security_events);
        if summary.attack_count > 0 {
            tracing::debug!(
                attack_count = summary.attack_count,
                blocked_count = summary.blocked_count,
                "security events in log window"
            );
        }
        self.broadcaster.publish(TelemetryEvent::Security(summary));
        Ok(())
    }

    async fn poll_wan(&self) -> Result<(), PollError> {
        let records = self.call(paths::INTERFACES).await?;
        let selection = self.store.wan_selection();
        let thresholds = self.store.thresholds();
        let interfaces: Vec<_> = records
            .iter()
            .map(|r| wan::interface_info(r, &selection))
            .collect();
        let summary = self
            .wan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(
                &interfaces,
                &selection,
                &thresholds,
                PollTask::Wan.period(&self.polling),
                now_millis(),
            );
        self.broadcaster.publish(TelemetryEvent::Wan(summary));
        Ok(())
    }

    async fn poll_cameras(&self) -> Result<(), PollError> {
        let (leases, arp) = tokio::try_join!(self.call(paths::DHCP_LEASES), self.call(paths::ARP))?;
        let leases: Vec<Lease> = leases.iter().map(Lease::from_record).collect();
        let cameras = self.classifier.cameras(&leases, &arp_macs(&arp));
        tracing::debug!(cameras = cameras.len(), leases = leases.len(), "camera detection complete");
        self.broadcaster.publish(TelemetryEvent::Cameras(cameras));
        Ok(())
    }
}

#[derive(Default)]
pub struct PollingScheduler {
    cancel: Option<CancellationToken>,
    handles: Vec<JoinHandle<()>>,
}

impl PollingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    /// Spawn one loop per task. Returns false (and does nothing) when already running.
    pub fn start(&mut self, ctx: Arc<PollContext>) -> bool {
        if self.is_running() {
            tracing::debug!("scheduler already running");
            return false;
        }
        let cancel = CancellationToken::new();
        self.handles = PollTask::ALL
            .iter()
            .map(|&task| {
                let period = task.period(&ctx.polling);
                tokio::spawn(run_task(ctx.clone(), task, period, cancel.clone()))
            })
            .collect();
        self.cancel = Some(cancel);
        tracing::info!(router = %ctx.router.id, tasks = PollTask::ALL.len(), "polling scheduler started");
        true
    }

    /// Cancel every task and wait for them to finish; no tick runs after this returns.
    pub async fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "polling task join failed");
            }
        }
        tracing::info!("polling scheduler stopped");
    }
}

async fn run_task(ctx: Arc<PollContext>, task: PollTask, period: Duration, cancel: CancellationToken) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tick.tick() => {
                let run = AssertUnwindSafe(ctx.tick(task)).catch_unwind();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    outcome = run => match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(PollError::NotConnected)) => break,
                        Ok(Err(e)) => tracing::warn!(
                            error = %e,
                            operation = task.name(),
                            "poll tick failed; keeping previous state"
                        ),
                        Err(_) => tracing::error!(operation = task.name(), "poll tick panicked"),
                    },
                }
            }
        }
    }
    tracing::debug!(task = task.name(), "polling task exited");
}
