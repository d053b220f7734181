//! Byte-stream transports for interactive device sessions.
//!
//! Every transport exposes the same contract: send raw bytes, poll for
//! whatever is currently buffered (bounded by a short poll quantum, never
//! an unbounded block), and an idempotent close. SSH is the non-trivial
//! implementation; Telnet and serial are structurally identical variants.
//!
//! A transport handle is exclusively owned by one session for its whole
//! lifetime and is never reused after close.

use std::time::Duration;

use async_trait::async_trait;

use crate::config;
use crate::error::{ConnectError, ExecError};

mod scripted;
mod security;
mod serial;
mod ssh;
mod telnet;

pub use scripted::{ScriptController, ScriptStep, ScriptedTransport};
pub use security::{ConnectionSecurityOptions, SecurityLevel};
pub use serial::SerialTransport;
pub use ssh::SshTransport;
pub use telnet::TelnetTransport;

/// Kind of transport carrying a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Ssh,
    Telnet,
    Serial,
}

/// Parameters for an SSH endpoint.
#[derive(Debug, Clone)]
pub struct SshParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub security: ConnectionSecurityOptions,
}

impl SshParams {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: config::DEFAULT_SSH_PORT,
            username: username.into(),
            password: password.into(),
            security: ConnectionSecurityOptions::default(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_security(mut self, security: ConnectionSecurityOptions) -> Self {
        self.security = security;
        self
    }
}

/// Parameters for a Telnet endpoint.
#[derive(Debug, Clone)]
pub struct TelnetParams {
    pub host: String,
    pub port: u16,
}

impl TelnetParams {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: config::DEFAULT_TELNET_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// Parameters for a serial endpoint.
#[derive(Debug, Clone)]
pub struct SerialParams {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    pub baud_rate: u32,
}

impl SerialParams {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: config::DEFAULT_BAUD_RATE,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// One physical connection target.
#[derive(Debug, Clone)]
pub enum Endpoint {
    Ssh(SshParams),
    Telnet(TelnetParams),
    Serial(SerialParams),
}

impl Endpoint {
    pub fn kind(&self) -> TransportKind {
        match self {
            Endpoint::Ssh(_) => TransportKind::Ssh,
            Endpoint::Telnet(_) => TransportKind::Telnet,
            Endpoint::Serial(_) => TransportKind::Serial,
        }
    }

    /// Stable identity string, used for logging and pool keying.
    pub fn label(&self) -> String {
        match self {
            Endpoint::Ssh(p) => format!("ssh://{}@{}:{}", p.username, p.host, p.port),
            Endpoint::Telnet(p) => format!("telnet://{}:{}", p.host, p.port),
            Endpoint::Serial(p) => format!("serial://{}@{}", p.path, p.baud_rate),
        }
    }
}

/// Raw byte-stream abstraction over one open channel.
#[async_trait]
pub trait Transport: Send {
    /// Writes raw bytes to the channel.
    async fn send(&mut self, data: &[u8]) -> Result<(), ExecError>;

    /// Returns up to `max_len` bytes currently buffered. Blocks at most one
    /// poll quantum; an empty vector means nothing arrived in that window.
    async fn poll_recv(&mut self, max_len: usize) -> Result<Vec<u8>, ExecError>;

    /// Releases the underlying OS resources. Idempotent.
    async fn close(&mut self);

    fn is_open(&self) -> bool;

    fn kind(&self) -> TransportKind;
}

/// Opens the transport described by `endpoint`.
///
/// `poll_quantum` bounds every subsequent `poll_recv` call on the returned
/// handle.
pub async fn open(
    endpoint: &Endpoint,
    connect_timeout: Duration,
    poll_quantum: Duration,
) -> Result<Box<dyn Transport>, ConnectError> {
    match endpoint {
        Endpoint::Ssh(params) => Ok(Box::new(
            SshTransport::open(params, connect_timeout, poll_quantum).await?,
        )),
        Endpoint::Telnet(params) => Ok(Box::new(
            TelnetTransport::open(params, connect_timeout, poll_quantum).await?,
        )),
        Endpoint::Serial(params) => Ok(Box::new(SerialTransport::open(params, poll_quantum)?)),
    }
}

/// Splits off up to `max_len` bytes from the front of a pending buffer.
pub(crate) fn take_pending(pending: &mut Vec<u8>, max_len: usize) -> Vec<u8> {
    if pending.len() <= max_len {
        std::mem::take(pending)
    } else {
        let rest = pending.split_off(max_len);
        std::mem::replace(pending, rest)
    }
}
