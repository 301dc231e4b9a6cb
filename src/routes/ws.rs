// Telemetry WebSocket: cached snapshots on connect, then the live stream

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::time::{Duration, MissedTickBehavior, interval, timeout};

use super::AppState;
use crate::models::TelemetryEvent;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements the subscriber count on drop (connect = +1, drop = -1).
struct WsConnectionGuard(Arc<AtomicUsize>);

impl Drop for WsConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(super) async fn ws_telemetry(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        // Subscribe before reading the cache so nothing published in between is lost.
        let rx = state.broadcaster.subscribe();
        let welcome = state.broadcaster.latest();
        if let Err(e) = stream_telemetry(socket, rx, welcome, state.ws_connections.clone()).await {
            tracing::info!(error = %e, "telemetry stream error");
        }
    })
}

/// Ok(false) when the client is gone or too slow.
async fn send_event(socket: &mut WebSocket, event: &TelemetryEvent) -> anyhow::Result<bool> {
    let json = serde_json::to_string(event)?;
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    Ok(matches!(r, Ok(Ok(()))))
}

async fn stream_telemetry(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<TelemetryEvent>,
    welcome: Vec<TelemetryEvent>,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    let subscribers = conn_count.fetch_add(1, Ordering::Relaxed) + 1;
    let _guard = WsConnectionGuard(conn_count);
    tracing::info!(subscribers, snapshots = welcome.len(), "client connected to telemetry stream");

    for event in &welcome {
        if !send_event(&mut socket, event).await? {
            return Ok(());
        }
    }

    let mut ping_interval = interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await? {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "telemetry client lagged; skipped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    tracing::info!("client disconnected from telemetry stream");
    Ok(())
}
