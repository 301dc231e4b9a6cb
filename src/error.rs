// Error taxonomy: connection, poll tick and configuration store failures.

use thiserror::Error;

/// Failure talking to a router through the protocol client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("connect to {host}:{port} failed: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },

    #[error("request timeout after {0}ms")]
    Timeout(u64),

    #[error("call {path} failed: {message}")]
    Call { path: String, message: String },

    #[error("session closed")]
    Closed,
}

/// A single polling tick failed. Logged by the scheduler, never propagated past the tick.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("no active session")]
    NotConnected,

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Configuration store errors. Reads fall back to defaults; writes surface these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store parse: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown router id: {0}")]
    UnknownRouter(String),

    #[error("duplicate router id: {0}")]
    DuplicateRouter(String),
}

/// Active-session control failures. Connect failures are also published as a
/// disconnected `connection_status` carrying the error text.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown router id: {0}")]
    UnknownRouter(String),

    #[error("no routers registered")]
    NoRouters,

    #[error(transparent)]
    Client(#[from] ClientError),
}
