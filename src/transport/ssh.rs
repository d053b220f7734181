//! SSH transport: one interactive shell channel per handle.
//!
//! Channel I/O runs on a dedicated task bridging the russh channel to a
//! pair of mpsc queues, so `poll_recv` is a plain timed receive and never
//! touches protocol internals.

use std::time::Duration;

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::Config;
use async_trait::async_trait;
use log::{debug, trace};
use russh::ChannelMsg;
use tokio::sync::mpsc::{self, Receiver, Sender};

use super::{SshParams, Transport, TransportKind, take_pending};
use crate::error::{ConnectError, ExecError};

const QUEUE_DEPTH: usize = 256;

pub struct SshTransport {
    client: Client,
    outbound: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
    pending: Vec<u8>,
    poll_quantum: Duration,
    open: bool,
    label: String,
}

impl SshTransport {
    /// Connects, authenticates and opens one interactive shell channel
    /// with a PTY.
    pub async fn open(
        params: &SshParams,
        connect_timeout: Duration,
        poll_quantum: Duration,
    ) -> Result<SshTransport, ConnectError> {
        let label = format!("{}@{}:{}", params.username, params.host, params.port);

        let config = Config {
            preferred: params.security.preferred(),
            inactivity_timeout: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        let connect = Client::connect_with_config(
            (params.host.clone(), params.port),
            &params.username,
            AuthMethod::with_password(&params.password),
            params.security.server_check.clone(),
            config,
        );
        let client = match tokio::time::timeout(connect_timeout, connect).await {
            Err(_) => return Err(ConnectError::Timeout),
            Ok(Err(err)) => return Err(classify_ssh_error(&err)),
            Ok(Ok(client)) => client,
        };
        debug!("{label} TCP connection and authentication successful");

        let mut channel = client
            .get_channel()
            .await
            .map_err(|err| ConnectError::Protocol(err.to_string()))?;
        channel
            .request_pty(false, "xterm", 800, 600, 0, 0, &[])
            .await
            .map_err(|err| ConnectError::Protocol(err.to_string()))?;
        channel
            .request_shell(false)
            .await
            .map_err(|err| ConnectError::Protocol(err.to_string()))?;
        debug!("{label} shell request successful");

        let (outbound, mut from_caller) = mpsc::channel::<Vec<u8>>(QUEUE_DEPTH);
        let (to_caller, inbound) = mpsc::channel::<Vec<u8>>(QUEUE_DEPTH);

        let task_label = label.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(data) = from_caller.recv() => {
                        if let Err(err) = channel.data(&data[..]).await {
                            debug!("{task_label} failed to send data to shell: {err:?}");
                            break;
                        }
                    },
                    Some(msg) = channel.wait() => {
                        match msg {
                            ChannelMsg::Data { ref data } => {
                                trace!("{task_label} received {} bytes", data.len());
                                if to_caller.send(data.to_vec()).await.is_err() {
                                    debug!("{task_label} receiver dropped, closing task");
                                    break;
                                }
                            }
                            ChannelMsg::ExitStatus { exit_status } => {
                                debug!("{task_label} shell exited with status {exit_status}");
                                let _ = channel.eof().await;
                                break;
                            }
                            ChannelMsg::Eof => {
                                debug!("{task_label} shell sent EOF");
                                break;
                            }
                            _ => {}
                        }
                    },
                    else => break,
                }
            }
            debug!("{task_label} SSH I/O task ended");
        });

        Ok(Self {
            client,
            outbound,
            inbound,
            pending: Vec::new(),
            poll_quantum,
            open: true,
            label,
        })
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn send(&mut self, data: &[u8]) -> Result<(), ExecError> {
        if !self.open {
            return Err(ExecError::Io("ssh channel is closed".to_string()));
        }
        self.outbound
            .send(data.to_vec())
            .await
            .map_err(|_| ExecError::Io("ssh channel writer closed".to_string()))
    }

    async fn poll_recv(&mut self, max_len: usize) -> Result<Vec<u8>, ExecError> {
        if !self.pending.is_empty() {
            return Ok(take_pending(&mut self.pending, max_len));
        }
        if !self.open {
            return Err(ExecError::Io("ssh channel is closed".to_string()));
        }
        match tokio::time::timeout(self.poll_quantum, self.inbound.recv()).await {
            Err(_) => Ok(Vec::new()),
            Ok(None) => Err(ExecError::Io("ssh channel closed by peer".to_string())),
            Ok(Some(chunk)) => {
                self.pending = chunk;
                Ok(take_pending(&mut self.pending, max_len))
            }
        }
    }

    async fn close(&mut self) {
        if !self.open {
            return;
        }
        debug!("{} closing SSH transport", self.label);
        self.open = false;
        self.inbound.close();
        // The underlying client tears the TCP connection down on drop.
    }

    fn is_open(&self) -> bool {
        self.open && !self.client.is_closed()
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Ssh
    }
}

/// Best-effort mapping of a library connect failure onto the closed
/// [`ConnectError`] taxonomy. The SSH library does not expose a stable
/// machine-readable error classification, so this falls back to the
/// rendered message for the auth/unreachable distinction.
fn classify_ssh_error(err: &async_ssh2_tokio::Error) -> ConnectError {
    let detail = err.to_string();
    let lower = detail.to_ascii_lowercase();
    if lower.contains("auth") || lower.contains("password") || lower.contains("permission") {
        ConnectError::AuthFailed
    } else if lower.contains("refused")
        || lower.contains("unreachable")
        || lower.contains("resolve")
        || lower.contains("lookup")
    {
        ConnectError::Unreachable(detail)
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ConnectError::Timeout
    } else {
        ConnectError::Protocol(detail)
    }
}
