//! Offline transport driven by a prepared script.
//!
//! A [`ScriptedTransport`] replays queued chunks as if a device were on
//! the wire, while the paired [`ScriptController`] records everything
//! the caller sent. Useful for exercising session logic without a
//! reachable device.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Transport, TransportKind, take_pending};
use crate::error::ExecError;

/// One scripted event, consumed in queue order by `poll_recv`.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Bytes delivered immediately.
    Chunk(Vec<u8>),
    /// Bytes delivered only after the caller has performed one more
    /// `send` than has already been consumed by earlier `OnSend` steps.
    OnSend(Vec<u8>),
    /// A fixed number of empty polls before the next step is visible.
    Silence(u32),
    /// A read failure surfaced as `ExecError::Io`.
    Fail(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    sent: Vec<Vec<u8>>,
    unmatched_sends: u32,
    fail_send_at: Option<usize>,
    open: bool,
}

/// Handle for scripting a [`ScriptedTransport`] and inspecting what was
/// written to it. Cloneable; all clones share the same state.
#[derive(Clone)]
pub struct ScriptController {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptController {
    /// Queues bytes to be delivered on the next poll.
    pub fn push_chunk(&self, data: impl AsRef<[u8]>) {
        self.lock().steps.push_back(ScriptStep::Chunk(data.as_ref().to_vec()));
    }

    /// Queues bytes that stay hidden until the caller sends something.
    pub fn push_on_send(&self, data: impl AsRef<[u8]>) {
        self.lock().steps.push_back(ScriptStep::OnSend(data.as_ref().to_vec()));
    }

    /// Queues a number of polls that return nothing.
    pub fn push_silence(&self, polls: u32) {
        self.lock().steps.push_back(ScriptStep::Silence(polls));
    }

    /// Queues a read error.
    pub fn push_error(&self, message: impl Into<String>) {
        self.lock().steps.push_back(ScriptStep::Fail(message.into()));
    }

    /// Makes the n-th `send` (zero-based) fail and close the transport.
    pub fn fail_on_send(&self, index: usize) {
        self.lock().fail_send_at = Some(index);
    }

    /// Everything the caller has written, in order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// The sent log, lossily decoded and concatenated.
    pub fn sent_text(&self) -> String {
        self.lock()
            .sent
            .iter()
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    pending: Vec<u8>,
    poll_quantum: Duration,
}

impl ScriptedTransport {
    /// Creates a transport with the given poll quantum and its
    /// controller. Tests typically use a quantum of a few milliseconds.
    pub fn new(poll_quantum: Duration) -> (ScriptedTransport, ScriptController) {
        let state = Arc::new(Mutex::new(ScriptState {
            open: true,
            ..ScriptState::default()
        }));
        let controller = ScriptController { state: state.clone() };
        let transport = ScriptedTransport {
            state,
            pending: Vec::new(),
            poll_quantum,
        };
        (transport, controller)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Pops the next deliverable step, honoring send gating and
    /// silence countdowns. `None` means this poll sees nothing.
    fn next_event(&self) -> Option<Result<Vec<u8>, ExecError>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        match state.steps.front_mut()? {
            ScriptStep::Silence(polls) => {
                if *polls > 1 {
                    *polls -= 1;
                    return None;
                }
            }
            ScriptStep::OnSend(_) => {
                if state.unmatched_sends == 0 {
                    return None;
                }
                state.unmatched_sends -= 1;
            }
            ScriptStep::Chunk(_) => {}
            ScriptStep::Fail(_) => state.open = false,
        }
        match state.steps.pop_front() {
            Some(ScriptStep::Chunk(data) | ScriptStep::OnSend(data)) => Some(Ok(data)),
            Some(ScriptStep::Fail(message)) => Some(Err(ExecError::Io(message))),
            Some(ScriptStep::Silence(_)) | None => None,
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, data: &[u8]) -> Result<(), ExecError> {
        let mut state = self.lock();
        if !state.open {
            return Err(ExecError::Io("scripted transport is closed".to_string()));
        }
        let index = state.sent.len();
        state.sent.push(data.to_vec());
        if state.fail_send_at == Some(index) {
            state.open = false;
            return Err(ExecError::Io("scripted send failure".to_string()));
        }
        state.unmatched_sends += 1;
        Ok(())
    }

    async fn poll_recv(&mut self, max_len: usize) -> Result<Vec<u8>, ExecError> {
        if !self.pending.is_empty() {
            return Ok(take_pending(&mut self.pending, max_len));
        }
        if !self.lock().open {
            return Err(ExecError::Io("scripted transport is closed".to_string()));
        }
        match self.next_event() {
            Some(Ok(chunk)) => {
                self.pending = chunk;
                Ok(take_pending(&mut self.pending, max_len))
            }
            Some(Err(err)) => Err(err),
            None => {
                tokio::time::sleep(self.poll_quantum).await;
                Ok(Vec::new())
            }
        }
    }

    async fn close(&mut self) {
        self.lock().open = false;
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Ssh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUANTUM: Duration = Duration::from_millis(2);

    #[tokio::test]
    async fn chunks_replay_in_order() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_chunk("hello ");
        script.push_chunk("world");
        assert_eq!(transport.poll_recv(64).await.unwrap(), b"hello ");
        assert_eq!(transport.poll_recv(64).await.unwrap(), b"world");
        assert!(transport.poll_recv(64).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn max_len_splits_a_chunk() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_chunk("abcdef");
        assert_eq!(transport.poll_recv(4).await.unwrap(), b"abcd");
        assert_eq!(transport.poll_recv(4).await.unwrap(), b"ef");
    }

    #[tokio::test]
    async fn on_send_waits_for_a_send() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_on_send("Router#");
        assert!(transport.poll_recv(64).await.unwrap().is_empty());
        transport.send(b"show version\n").await.unwrap();
        assert_eq!(transport.poll_recv(64).await.unwrap(), b"Router#");
        assert_eq!(script.sent_text(), "show version\n");
    }

    #[tokio::test]
    async fn silence_counts_down_polls() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_silence(2);
        script.push_chunk("late");
        assert!(transport.poll_recv(64).await.unwrap().is_empty());
        assert!(transport.poll_recv(64).await.unwrap().is_empty());
        assert_eq!(transport.poll_recv(64).await.unwrap(), b"late");
    }

    #[tokio::test]
    async fn scripted_failure_closes_the_transport() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_error("link down");
        assert_eq!(
            transport.poll_recv(64).await,
            Err(ExecError::Io("link down".to_string()))
        );
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn fail_on_send_rejects_the_indexed_write() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.fail_on_send(1);
        transport.send(b"first\n").await.unwrap();
        assert!(transport.send(b"second\n").await.is_err());
        assert!(!transport.is_open());
        assert_eq!(script.sent().len(), 2);
    }
}
