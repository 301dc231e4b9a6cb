// Protocol client contract. The wire protocol lives outside this crate; the
// embedder supplies a `RouterClient` and every component talks through it.

use crate::error::ClientError;
use crate::models::RouterRegistration;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// One row of a tabular response: field name to raw string value.
pub type Record = HashMap<String, String>;

/// Resource paths polled by the core.
pub mod paths {
    pub const IDENTITY: &str = "/system/identity/print";
    pub const RESOURCE: &str = "/system/resource/print";
    pub const INTERFACES: &str = "/interface/print";
    pub const DHCP_LEASES: &str = "/ip/dhcp-server/lease/print";
    pub const ARP: &str = "/ip/arp/print";
    pub const LOG: &str = "/log/print";
}

/// Where and how to open a session.
#[derive(Clone)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ConnectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl From<&RouterRegistration> for ConnectTarget {
    fn from(r: &RouterRegistration) -> Self {
        Self {
            host: r.host.clone(),
            port: r.port,
            username: r.username.clone(),
            password: r.password.clone(),
        }
    }
}

/// Opens sessions to routers.
#[async_trait]
pub trait RouterClient: Send + Sync {
    async fn connect(
        &self,
        target: &ConnectTarget,
        timeout: Duration,
    ) -> Result<Box<dyn RouterSession>, ClientError>;
}

/// A live session. Shared between polling tasks, so calls take `&self`.
#[async_trait]
pub trait RouterSession: Send + Sync {
    async fn call(&self, path: &str, params: &[(&str, &str)])
    -> Result<Vec<Record>, ClientError>;

    async fn close(&self);
}

/// Field value or "" when absent.
pub fn field<'a>(record: &'a Record, key: &str) -> &'a str {
    record.get(key).map(String::as_str).unwrap_or("")
}

/// Numeric field; absent or unparseable values read as 0.
pub fn field_u64(record: &Record, key: &str) -> u64 {
    field(record, key).trim().parse().unwrap_or(0)
}

pub fn field_bool(record: &Record, key: &str) -> bool {
    matches!(field(record, key), "true" | "yes")
}
