// Active session controller: at most one live connection, polled by the scheduler.

use crate::classifier::Classifier;
use crate::client::{ConnectTarget, Record, RouterClient, RouterSession, paths};
use crate::config::{HistoryConfig, PollingConfig};
use crate::error::{ClientError, SessionError};
use crate::models::{ConnectionStatus, RouterRegistration, SystemInfo, TelemetryEvent, now_millis};
use crate::resources;
use crate::scheduler::{PollContext, PollContextDeps, PollingScheduler};
use crate::store::ConfigStore;
use crate::telemetry::Broadcaster;
use crate::wan::WanTracker;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::time::timeout;

struct ActiveSession {
    router: RouterRegistration,
    ctx: Arc<PollContext>,
}

#[derive(Default)]
struct State {
    active: Option<ActiveSession>,
    scheduler: PollingScheduler,
    wan_trackers: HashMap<String, Arc<Mutex<WanTracker>>>,
}

pub struct SessionController {
    client: Arc<dyn RouterClient>,
    store: Arc<ConfigStore>,
    classifier: Arc<Classifier>,
    broadcaster: Broadcaster,
    polling: PollingConfig,
    history: HistoryConfig,
    /// Held across connect/disconnect so teardown and setup never interleave.
    state: tokio::sync::Mutex<State>,
    /// Readable while a handshake holds `state`.
    current: RwLock<Option<(RouterRegistration, ConnectionStatus)>>,
}

impl SessionController {
    pub fn new(
        client: Arc<dyn RouterClient>,
        store: Arc<ConfigStore>,
        classifier: Arc<Classifier>,
        broadcaster: Broadcaster,
        polling: PollingConfig,
        history: HistoryConfig,
    ) -> Self {
        Self {
            client,
            store,
            classifier,
            broadcaster,
            polling,
            history,
            state: tokio::sync::Mutex::new(State::default()),
            current: RwLock::new(None),
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.read_current(|(_, status)| status.clone())
            .unwrap_or_default()
    }

    pub async fn is_connected(&self) -> bool {
        self.read_current(|_| ()).is_some()
    }

    pub async fn active_router(&self) -> Option<RouterRegistration> {
        self.read_current(|(router, _)| router.clone())
    }

    fn read_current<T>(&self, f: impl FnOnce(&(RouterRegistration, ConnectionStatus)) -> T) -> Option<T> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }

    fn set_current(&self, current: Option<(RouterRegistration, ConnectionStatus)>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = current;
    }

    /// Connect to the store's default router.
    pub async fn connect_default(&self) -> Result<ConnectionStatus, SessionError> {
        let router = self.store.default_router().ok_or(SessionError::NoRouters)?;
        self.connect(&router.id).await
    }

    /// Open a session to `router_id`, replacing any active one, and start polling it.
    pub async fn connect(&self, router_id: &str) -> Result<ConnectionStatus, SessionError> {
        let router = self
            .store
            .router(router_id)
            .ok_or_else(|| SessionError::UnknownRouter(router_id.to_string()))?;

        let mut state = self.state.lock().await;
        self.teardown(&mut state).await;
        let registered = self.store.routers();
        state
            .wan_trackers
            .retain(|id, _| registered.iter().any(|r| &r.id == id));

        tracing::info!(router = %router.id, host = %router.host, "connecting to router");
        let session = match self.open(&router).await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    router = %router.id,
                    operation = "connect",
                    "router connect failed"
                );
                self.broadcaster
                    .publish(TelemetryEvent::ConnectionStatus(ConnectionStatus {
                        connected: false,
                        router_id: Some(router.id.clone()),
                        router_name: Some(router.name.clone()),
                        host: Some(router.host.clone()),
                        connected_at: None,
                        error: Some(e.to_string()),
                    }));
                return Err(e.into());
            }
        };

        let connected_at = now_millis();
        let status = connected_status(&router, connected_at);
        self.broadcaster
            .publish(TelemetryEvent::ConnectionStatus(status.clone()));
        self.broadcaster
            .publish(TelemetryEvent::SystemInfo(read_system_info(session.as_ref()).await));

        let wan = state
            .wan_trackers
            .entry(router.id.clone())
            .or_default()
            .clone();
        let ctx = Arc::new(PollContext::new(PollContextDeps {
            router: router.clone(),
            session,
            store: self.store.clone(),
            classifier: self.classifier.clone(),
            broadcaster: self.broadcaster.clone(),
            polling: self.polling.clone(),
            history: self.history.clone(),
            wan,
        }));
        state.scheduler.start(ctx.clone());
        state.active = Some(ActiveSession { router: router.clone(), ctx });
        self.set_current(Some((router, status.clone())));
        Ok(status)
    }

    /// Switch the active router: disconnect, then connect to `router_id`.
    pub async fn switch(&self, router_id: &str) -> Result<ConnectionStatus, SessionError> {
        self.connect(router_id).await
    }

    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if self.teardown(&mut state).await {
            self.broadcaster
                .publish(TelemetryEvent::ConnectionStatus(ConnectionStatus::default()));
        }
    }

    async fn open(&self, router: &RouterRegistration) -> Result<Arc<dyn RouterSession>, ClientError> {
        let limit = self.polling.connect_timeout();
        let target = ConnectTarget::from(router);
        match timeout(limit, self.client.connect(&target, limit)).await {
            Ok(session) => Ok(Arc::from(session?)),
            Err(_) => Err(ClientError::Timeout(limit.as_millis() as u64)),
        }
    }

    /// Stop every polling task before the handle is released. Returns whether a session existed.
    async fn teardown(&self, state: &mut State) -> bool {
        let Some(active) = state.active.take() else {
            return false;
        };
        self.set_current(None);
        active.ctx.mark_disconnected();
        state.scheduler.stop().await;
        active.ctx.session().close().await;
        self.broadcaster.clear_session();
        tracing::info!(router = %active.router.id, "router session closed");
        true
    }
}

fn connected_status(router: &RouterRegistration, connected_at: u64) -> ConnectionStatus {
    ConnectionStatus {
        connected: true,
        router_id: Some(router.id.clone()),
        router_name: Some(router.name.clone()),
        host: Some(router.host.clone()),
        connected_at: Some(connected_at),
        error: None,
    }
}

/// Identity and resource rows read once after connect; a failed call leaves its fields empty.
async fn read_system_info(session: &dyn RouterSession) -> SystemInfo {
    let (identity, resource) = tokio::join!(
        session.call(paths::IDENTITY, &[]),
        session.call(paths::RESOURCE, &[])
    );
    let first = |result: Result<Vec<Record>, ClientError>, path: &str| match result {
        Ok(mut rows) if !rows.is_empty() => Some(rows.swap_remove(0)),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, path, "system info read failed");
            None
        }
    };
    let identity = first(identity, paths::IDENTITY);
    let resource = first(resource, paths::RESOURCE);
    resources::system_info(identity.as_ref(), resource.as_ref())
}
