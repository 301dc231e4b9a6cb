use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub fleet: FleetConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the router registry, WAN selection and thresholds.
    pub path: String,
}

/// Per-task cadences for the active-router scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_traffic_ms")]
    pub traffic_ms: u64,
    #[serde(default = "default_resources_ms")]
    pub resources_ms: u64,
    #[serde(default = "default_interfaces_ms")]
    pub interfaces_ms: u64,
    #[serde(default = "default_devices_ms")]
    pub devices_ms: u64,
    #[serde(default = "default_logs_ms")]
    pub logs_ms: u64,
    #[serde(default = "default_wan_ms")]
    pub wan_ms: u64,
    #[serde(default = "default_cameras_ms")]
    pub cameras_ms: u64,
    /// How many recent log lines the logs task analyzes.
    #[serde(default = "default_log_lines")]
    pub log_lines: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_traffic_ms() -> u64 {
    1000
}
fn default_resources_ms() -> u64 {
    2000
}
fn default_interfaces_ms() -> u64 {
    10_000
}
fn default_devices_ms() -> u64 {
    15_000
}
fn default_logs_ms() -> u64 {
    5000
}
fn default_wan_ms() -> u64 {
    10_000
}
fn default_cameras_ms() -> u64 {
    20_000
}
fn default_log_lines() -> usize {
    100
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            traffic_ms: default_traffic_ms(),
            resources_ms: default_resources_ms(),
            interfaces_ms: default_interfaces_ms(),
            devices_ms: default_devices_ms(),
            logs_ms: default_logs_ms(),
            wan_ms: default_wan_ms(),
            cameras_ms: default_cameras_ms(),
            log_lines: default_log_lines(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl PollingConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// Fleet-wide heartbeat over every registered router.
#[derive(Debug, Clone, Deserialize)]
pub struct FleetConfig {
    #[serde(default = "default_fleet_interval_secs")]
    pub interval_secs: u64,
    /// Per-router probe bound; must stay below `interval_secs`.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Delay after start before the first cycle.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    #[serde(default = "default_fleet_history_capacity")]
    pub history_capacity: usize,
}

fn default_fleet_interval_secs() -> u64 {
    30
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_settle_delay_secs() -> u64 {
    10
}
fn default_fleet_history_capacity() -> usize {
    50
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_fleet_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            settle_delay_secs: default_settle_delay_secs(),
            history_capacity: default_fleet_history_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_traffic_capacity")]
    pub traffic_capacity: usize,
    /// CPU/memory points kept for the resources snapshot.
    #[serde(default = "default_resource_capacity")]
    pub resource_capacity: usize,
    #[serde(default = "default_security_events")]
    pub security_events: usize,
}

fn default_traffic_capacity() -> usize {
    100
}
fn default_resource_capacity() -> usize {
    60
}
fn default_security_events() -> usize {
    20
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            traffic_capacity: default_traffic_capacity(),
            resource_capacity: default_resource_capacity(),
            security_events: default_security_events(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishingConfig {
    /// Max number of telemetry events buffered per subscriber (slow clients may lag).
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierConfig {
    /// Optional JSON file replacing the built-in vendor/keyword tables.
    pub tables_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(!self.store.path.is_empty(), "store.path must be non-empty");

        let cadences = [
            ("polling.traffic_ms", self.polling.traffic_ms),
            ("polling.resources_ms", self.polling.resources_ms),
            ("polling.interfaces_ms", self.polling.interfaces_ms),
            ("polling.devices_ms", self.polling.devices_ms),
            ("polling.logs_ms", self.polling.logs_ms),
            ("polling.wan_ms", self.polling.wan_ms),
            ("polling.cameras_ms", self.polling.cameras_ms),
            ("polling.connect_timeout_ms", self.polling.connect_timeout_ms),
        ];
        for (name, value) in cadences {
            anyhow::ensure!(value > 0, "{} must be > 0, got {}", name, value);
        }
        anyhow::ensure!(
            self.polling.log_lines > 0,
            "polling.log_lines must be > 0, got {}",
            self.polling.log_lines
        );
        anyhow::ensure!(
            self.fleet.interval_secs > 0,
            "fleet.interval_secs must be > 0, got {}",
            self.fleet.interval_secs
        );
        anyhow::ensure!(
            self.fleet.probe_timeout_secs > 0
                && self.fleet.probe_timeout_secs < self.fleet.interval_secs,
            "fleet.probe_timeout_secs must be > 0 and < fleet.interval_secs, got {}",
            self.fleet.probe_timeout_secs
        );
        anyhow::ensure!(
            self.fleet.history_capacity > 0,
            "fleet.history_capacity must be > 0, got {}",
            self.fleet.history_capacity
        );
        anyhow::ensure!(
            self.history.traffic_capacity > 0,
            "history.traffic_capacity must be > 0, got {}",
            self.history.traffic_capacity
        );
        anyhow::ensure!(
            self.history.resource_capacity > 0,
            "history.resource_capacity must be > 0, got {}",
            self.history.resource_capacity
        );
        anyhow::ensure!(
            self.history.security_events > 0,
            "history.security_events must be > 0, got {}",
            self.history.security_events
        );
        anyhow::ensure!(
            self.publishing.broadcast_capacity > 0,
            "publishing.broadcast_capacity must be > 0, got {}",
            self.publishing.broadcast_capacity
        );
        Ok(())
    }
}
