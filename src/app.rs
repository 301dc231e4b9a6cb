// Wiring: one context object per monitor instance, plus the serve loop.

use crate::classifier::Classifier;
use crate::client::RouterClient;
use crate::config::AppConfig;
use crate::fleet::FleetMonitor;
use crate::routes;
use crate::session::SessionController;
use crate::store::ConfigStore;
use crate::telemetry::Broadcaster;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything one monitor instance owns. Several can live side by side (e.g. in tests).
pub struct App {
    pub store: Arc<ConfigStore>,
    pub broadcaster: Broadcaster,
    pub session: Arc<SessionController>,
    pub fleet: Arc<FleetMonitor>,
    pub ws_connections: Arc<AtomicUsize>,
    cancel: CancellationToken,
    fleet_handle: Option<JoinHandle<()>>,
}

impl App {
    pub fn build(config: &AppConfig, client: Arc<dyn RouterClient>) -> Self {
        let store = Arc::new(ConfigStore::open(&config.store.path));
        Self::with_store(config, client, store)
    }

    pub fn with_store(
        config: &AppConfig,
        client: Arc<dyn RouterClient>,
        store: Arc<ConfigStore>,
    ) -> Self {
        let broadcaster = Broadcaster::new(config.publishing.broadcast_capacity);
        let classifier = Arc::new(Classifier::load(
            config.classifier.tables_path.as_deref().map(Path::new),
        ));
        let session = Arc::new(SessionController::new(
            client.clone(),
            store.clone(),
            classifier,
            broadcaster.clone(),
            config.polling.clone(),
            config.history.clone(),
        ));
        let fleet = Arc::new(FleetMonitor::new(
            client,
            store.clone(),
            broadcaster.clone(),
            config.fleet.clone(),
        ));
        Self {
            store,
            broadcaster,
            session,
            fleet,
            ws_connections: Arc::new(AtomicUsize::new(0)),
            cancel: CancellationToken::new(),
            fleet_handle: None,
        }
    }

    pub fn router(&self) -> axum::Router {
        routes::app(
            self.broadcaster.clone(),
            self.fleet.clone(),
            self.session.clone(),
            self.ws_connections.clone(),
        )
    }

    /// Start the fleet heartbeat once; later calls are no-ops.
    pub fn start_fleet(&mut self) {
        if self.fleet_handle.is_none() {
            self.fleet_handle = Some(self.fleet.clone().start(self.cancel.clone()));
        }
    }

    /// Stop the heartbeat and close the active session.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.fleet_handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "fleet monitor join failed");
            }
        }
        self.session.disconnect().await;
    }
}

/// Serve until ctrl-c / SIGTERM. The wire protocol client is supplied by the embedder.
pub async fn run(config: AppConfig, client: Arc<dyn RouterClient>) -> anyhow::Result<()> {
    let mut app = App::build(&config, client);
    app.start_fleet();
    if let Err(e) = app.session.connect_default().await {
        tracing::warn!(error = %e, "no active router session at startup");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    let served = axum::serve(listener, app.router())
        .with_graceful_shutdown(shutdown_signal())
        .await;
    tracing::info!("Received shutdown signal");
    app.shutdown().await;
    served?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
