//! Telnet transport over a plain TCP stream.
//!
//! The stream carries NVT option negotiation inline with data, so every
//! read passes through [`NvtFilter`] which strips IAC sequences and
//! produces refusal replies for any option the peer proposes.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{TelnetParams, Transport, TransportKind, take_pending};
use crate::config::RECV_CHUNK;
use crate::error::{ConnectError, ExecError, classify_io_connect};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

pub struct TelnetTransport {
    stream: TcpStream,
    filter: NvtFilter,
    pending: Vec<u8>,
    poll_quantum: Duration,
    open: bool,
    label: String,
}

impl TelnetTransport {
    pub async fn open(
        params: &TelnetParams,
        connect_timeout: Duration,
        poll_quantum: Duration,
    ) -> Result<TelnetTransport, ConnectError> {
        let label = format!("{}:{}", params.host, params.port);
        let connect = TcpStream::connect((params.host.clone(), params.port));
        let stream = match tokio::time::timeout(connect_timeout, connect).await {
            Err(_) => return Err(ConnectError::Timeout),
            Ok(Err(err)) => return Err(classify_io_connect(&err)),
            Ok(Ok(stream)) => stream,
        };
        debug!("{label} telnet TCP connection established");
        Ok(Self {
            stream,
            filter: NvtFilter::new(),
            pending: Vec::new(),
            poll_quantum,
            open: true,
            label,
        })
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    async fn send(&mut self, data: &[u8]) -> Result<(), ExecError> {
        if !self.open {
            return Err(ExecError::Io("telnet connection is closed".to_string()));
        }
        self.stream
            .write_all(data)
            .await
            .map_err(|err| ExecError::Io(err.to_string()))
    }

    async fn poll_recv(&mut self, max_len: usize) -> Result<Vec<u8>, ExecError> {
        if !self.pending.is_empty() {
            return Ok(take_pending(&mut self.pending, max_len));
        }
        if !self.open {
            return Err(ExecError::Io("telnet connection is closed".to_string()));
        }
        let mut buf = [0u8; RECV_CHUNK];
        match tokio::time::timeout(self.poll_quantum, self.stream.read(&mut buf)).await {
            Err(_) => Ok(Vec::new()),
            Ok(Err(err)) => {
                self.open = false;
                Err(ExecError::Io(err.to_string()))
            }
            Ok(Ok(0)) => {
                self.open = false;
                Err(ExecError::Io("connection closed by peer".to_string()))
            }
            Ok(Ok(n)) => {
                let (data, replies) = self.filter.filter(&buf[..n]);
                if !replies.is_empty() {
                    trace!("{} refusing {} negotiation bytes", self.label, replies.len());
                    self.stream
                        .write_all(&replies)
                        .await
                        .map_err(|err| ExecError::Io(err.to_string()))?;
                }
                self.pending = data;
                Ok(take_pending(&mut self.pending, max_len))
            }
        }
    }

    async fn close(&mut self) {
        if !self.open {
            return;
        }
        debug!("{} closing telnet transport", self.label);
        self.open = false;
        let _ = self.stream.shutdown().await;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Telnet
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NvtState {
    Data,
    Iac,
    Opt(u8),
    Sub,
    SubIac,
}

/// Incremental IAC stripper. Options offered by the peer are all
/// refused: DO answered with WONT, WILL answered with DONT.
/// Subnegotiation payloads are discarded and IAC IAC unescapes to a
/// literal 0xFF data byte. State carries across chunk boundaries.
struct NvtFilter {
    state: NvtState,
}

impl NvtFilter {
    fn new() -> Self {
        Self { state: NvtState::Data }
    }

    fn filter(&mut self, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut data = Vec::with_capacity(input.len());
        let mut replies = Vec::new();
        for &byte in input {
            self.state = match self.state {
                NvtState::Data => {
                    if byte == IAC {
                        NvtState::Iac
                    } else {
                        data.push(byte);
                        NvtState::Data
                    }
                }
                NvtState::Iac => match byte {
                    IAC => {
                        data.push(IAC);
                        NvtState::Data
                    }
                    DO | DONT | WILL | WONT => NvtState::Opt(byte),
                    SB => NvtState::Sub,
                    _ => NvtState::Data,
                },
                NvtState::Opt(verb) => {
                    match verb {
                        DO => replies.extend_from_slice(&[IAC, WONT, byte]),
                        WILL => replies.extend_from_slice(&[IAC, DONT, byte]),
                        _ => {}
                    }
                    NvtState::Data
                }
                NvtState::Sub => {
                    if byte == IAC {
                        NvtState::SubIac
                    } else {
                        NvtState::Sub
                    }
                }
                NvtState::SubIac => {
                    if byte == SE {
                        NvtState::Data
                    } else {
                        NvtState::Sub
                    }
                }
            };
        }
        (data, replies)
    }
}
