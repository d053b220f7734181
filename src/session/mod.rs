//! Interactive device sessions.
//!
//! A [`Session`] owns at most one transport and serializes every
//! operation through an internal async mutex, so concurrent callers
//! interleave at command granularity rather than byte granularity.
//! [`SessionManager`] pools sessions per endpoint for reuse.

mod client;
mod manager;

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

pub use client::Session;
pub use manager::{PooledSession, SessionManager};

use crate::config::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_THRESHOLD,
    DEFAULT_PAGING_SETTLE_DELAY, DEFAULT_POLL_QUANTUM, DEFAULT_SETTLE_DELAY, RECV_CHUNK,
};
use crate::error::ExecError;

/// Timing knobs for a session. Defaults fit real devices; tests shrink
/// everything to keep the suite fast.
#[derive(Debug, Clone, Copy)]
pub struct SessionTuning {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    /// Banner drain window after login.
    pub settle_delay: Duration,
    /// Extra quiet period after paging-disable commands.
    pub paging_settle_delay: Duration,
    pub idle_threshold: Duration,
    pub poll_quantum: Duration,
    pub recv_chunk: usize,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            paging_settle_delay: DEFAULT_PAGING_SETTLE_DELAY,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            poll_quantum: DEFAULT_POLL_QUANTUM,
            recv_chunk: RECV_CHUNK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Outcome of one step of a macro run. Failed steps carry the error
/// text instead of output; the run continues past them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MacroStepResult {
    pub index: usize,
    pub command: String,
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One command handed to a pooled session's worker task.
#[derive(Debug)]
pub struct ExecJob {
    pub command: String,
    pub timeout: Option<Duration>,
    pub responder: oneshot::Sender<Result<String, ExecError>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_macro_step_serializes_without_error_field() {
        let step = MacroStepResult {
            index: 0,
            command: "show version".to_string(),
            success: true,
            output: "ok".to_string(),
            error: None,
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["command"], "show version");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_macro_step_carries_the_error_text() {
        let step = MacroStepResult {
            index: 2,
            command: "show clock".to_string(),
            success: false,
            output: String::new(),
            error: Some(ExecError::NotConnected.to_string()),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "not connected to a device");
    }
}
