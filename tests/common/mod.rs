// Shared test helpers: scripted router client and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use routerwatch::client::{ConnectTarget, Record, RouterClient, RouterSession};
use routerwatch::config::AppConfig;
use routerwatch::error::ClientError;
use routerwatch::models::RouterRegistration;
use routerwatch::store::{ConfigStore, StoreDocument};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_CONFIG: &str = r#"
[server]
port = 8081
host = "127.0.0.1"

[store]
path = "data/routers.json"

[publishing]
broadcast_capacity = 64
"#;

pub fn test_config() -> AppConfig {
    AppConfig::load_from_str(TEST_CONFIG).unwrap()
}

pub fn record(fields: &[(&str, &str)]) -> Record {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn router(id: &str, host: &str) -> RouterRegistration {
    RouterRegistration {
        id: id.into(),
        name: format!("Router {}", id),
        host: host.into(),
        username: "admin".into(),
        password: "secret".into(),
        port: 8728,
        is_default: false,
    }
}

pub fn store_with(routers: Vec<RouterRegistration>) -> Arc<ConfigStore> {
    Arc::new(ConfigStore::in_memory(StoreDocument {
        routers,
        ..StoreDocument::default()
    }))
}

pub fn ether(name: &str, rx: u64, tx: u64) -> Record {
    let (rx, tx) = (rx.to_string(), tx.to_string());
    record(&[
        ("name", name),
        ("type", "ether"),
        ("running", "true"),
        ("disabled", "false"),
        ("rx-byte", rx.as_str()),
        ("tx-byte", tx.as_str()),
    ])
}

#[derive(Default)]
struct Script {
    down_hosts: HashSet<String>,
    hang_hosts: HashSet<String>,
    hanging_paths: HashSet<String>,
    failing_paths: HashSet<String>,
    panicking_paths: HashSet<String>,
    responses: HashMap<String, Vec<Record>>,
    connects: usize,
    calls: Vec<String>,
    calls_after_close: usize,
    closes: usize,
}

/// Scripted client: per-host failures and hangs, canned rows per path, call log.
#[derive(Clone, Default)]
pub struct FakeClient {
    script: Arc<Mutex<Script>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc(&self) -> Arc<dyn RouterClient> {
        Arc::new(self.clone())
    }

    pub fn set_down(&self, host: &str, down: bool) {
        let mut s = self.script.lock().unwrap();
        if down {
            s.down_hosts.insert(host.into());
        } else {
            s.down_hosts.remove(host);
        }
    }

    /// Connects to `host` never complete.
    pub fn hang(&self, host: &str) {
        self.script.lock().unwrap().hang_hosts.insert(host.into());
    }

    /// Calls to `path` are logged but never answer.
    pub fn hang_path(&self, path: &str) {
        self.script.lock().unwrap().hanging_paths.insert(path.into());
    }

    pub fn fail_path(&self, path: &str, fail: bool) {
        let mut s = self.script.lock().unwrap();
        if fail {
            s.failing_paths.insert(path.into());
        } else {
            s.failing_paths.remove(path);
        }
    }

    pub fn panic_on(&self, path: &str) {
        self.script.lock().unwrap().panicking_paths.insert(path.into());
    }

    pub fn respond(&self, path: &str, rows: Vec<Record>) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(path.into(), rows);
    }

    pub fn connects(&self) -> usize {
        self.script.lock().unwrap().connects
    }

    pub fn calls(&self, path: &str) -> usize {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    pub fn calls_after_close(&self) -> usize {
        self.script.lock().unwrap().calls_after_close
    }

    pub fn closes(&self) -> usize {
        self.script.lock().unwrap().closes
    }
}

#[async_trait]
impl RouterClient for FakeClient {
    async fn connect(
        &self,
        target: &ConnectTarget,
        _timeout: Duration,
    ) -> Result<Box<dyn RouterSession>, ClientError> {
        let (hang, down) = {
            let mut s = self.script.lock().unwrap();
            s.connects += 1;
            (
                s.hang_hosts.contains(&target.host),
                s.down_hosts.contains(&target.host),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if down {
            return Err(ClientError::Connect {
                host: target.host.clone(),
                port: target.port,
                message: "connection refused".into(),
            });
        }
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeSession {
    script: Arc<Mutex<Script>>,
    closed: AtomicBool,
}

#[async_trait]
impl RouterSession for FakeSession {
    async fn call(&self, path: &str, _params: &[(&str, &str)]) -> Result<Vec<Record>, ClientError> {
        let (panics, hangs, result) = {
            let mut s = self.script.lock().unwrap();
            if self.closed.load(Ordering::SeqCst) {
                s.calls_after_close += 1;
                return Err(ClientError::Closed);
            }
            s.calls.push(path.to_string());
            let result = if s.failing_paths.contains(path) {
                Err(ClientError::Call {
                    path: path.into(),
                    message: "scripted failure".into(),
                })
            } else {
                Ok(s.responses.get(path).cloned().unwrap_or_default())
            };
            (
                s.panicking_paths.contains(path),
                s.hanging_paths.contains(path),
                result,
            )
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        if panics {
            panic!("scripted panic on {}", path);
        }
        result
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.script.lock().unwrap().closes += 1;
    }
}
