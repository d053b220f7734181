//! Serial console transport.
//!
//! Opens a local serial device at 8N1 with the requested baud rate.
//! There is no connection handshake, so "connecting" only means the
//! device node opened successfully.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::{SerialParams, Transport, TransportKind, take_pending};
use crate::config::RECV_CHUNK;
use crate::error::{ConnectError, ExecError};

pub struct SerialTransport {
    stream: SerialStream,
    pending: Vec<u8>,
    poll_quantum: Duration,
    open: bool,
    label: String,
}

impl SerialTransport {
    pub fn open(params: &SerialParams, poll_quantum: Duration) -> Result<SerialTransport, ConnectError> {
        let label = format!("{}@{}", params.path, params.baud_rate);
        let stream = tokio_serial::new(&params.path, params.baud_rate)
            .open_native_async()
            .map_err(|err| classify_serial_error(&err))?;
        debug!("{label} serial port opened");
        Ok(Self {
            stream,
            pending: Vec::new(),
            poll_quantum,
            open: true,
            label,
        })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, data: &[u8]) -> Result<(), ExecError> {
        if !self.open {
            return Err(ExecError::Io("serial port is closed".to_string()));
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
            return Err(ExecError::Io("serial port is closed".to_string()));
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
                Err(ExecError::Io("serial port closed".to_string()))
            }
            Ok(Ok(n)) => {
                self.pending = buf[..n].to_vec();
                Ok(take_pending(&mut self.pending, max_len))
            }
        }
    }

    async fn close(&mut self) {
        if !self.open {
            return;
        }
        debug!("{} closing serial transport", self.label);
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }
}

fn classify_serial_error(err: &tokio_serial::Error) -> ConnectError {
    match err.kind {
        tokio_serial::ErrorKind::NoDevice => ConnectError::Unreachable(err.to_string()),
        _ => ConnectError::Protocol(err.to_string()),
    }
}
