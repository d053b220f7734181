//! Prompt detection and command output handling.
//!
//! Network OS shells have no out-of-band end-of-output marker, so
//! completion is inferred from the prompt reappearing on the last line
//! of the accumulated buffer, with an idle window as fallback for
//! devices whose prompt never matches.

use std::time::{Duration, Instant};

use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{DEFAULT_IDLE_THRESHOLD, RECV_CHUNK};
use crate::error::ExecError;
use crate::profile::DeviceProfile;
use crate::transport::Transport;

static ANSI_CSI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());

// Leading carriage returns and backspace runs emitted by pagers and
// line editors, possibly interleaved with whitespace.
static LINE_NOISE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\r+(\s+\r+)*)|(\u{8}+(\s+\u{8}+)*)").unwrap());

/// Returns true when the buffer's last non-empty line, trimmed, ends
/// with any of the prompt suffixes.
pub fn response_complete(buffer: &str, suffixes: &[&str]) -> bool {
    let Some(last) = buffer.lines().rev().find(|line| !line.trim().is_empty()) else {
        return false;
    };
    let last = last.trim();
    suffixes.iter().any(|suffix| last.ends_with(suffix))
}

/// Strips terminal noise, the echoed command and prompt lines from raw
/// shell output, leaving only the command's payload.
pub fn clean_output(raw: &str, command: &str, suffixes: &[&str]) -> String {
    let scrubbed = ANSI_CSI.replace_all(raw, "");
    let mut lines: Vec<String> = scrubbed
        .lines()
        .map(|line| {
            let line = LINE_NOISE_PREFIX.replace(line, "");
            line.trim_end_matches('\r').to_string()
        })
        .collect();

    let command = command.trim();
    if lines.first().is_some_and(|first| first.trim() == command) {
        lines.remove(0);
    }
    while lines.first().is_some_and(|first| first.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|last| {
        let last = last.trim();
        last.is_empty() || suffixes.iter().any(|suffix| last.ends_with(suffix))
    }) {
        lines.pop();
    }
    lines.join("\n")
}

/// Knobs for the read loop, separate from the per-command timeout.
#[derive(Debug, Clone, Copy)]
pub struct ReadTuning {
    /// Quiet period after the last byte that ends a read even without
    /// a recognized prompt.
    pub idle_threshold: Duration,
    /// Upper bound passed to each transport poll.
    pub recv_chunk: usize,
}

impl Default for ReadTuning {
    fn default() -> Self {
        Self {
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            recv_chunk: RECV_CHUNK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    AwaitingFirstByte,
    Accumulating,
}

/// Reads from a transport until the device's prompt reappears.
pub struct PromptEngine {
    profile: &'static DeviceProfile,
    tuning: ReadTuning,
}

impl PromptEngine {
    pub fn new(profile: &'static DeviceProfile, tuning: ReadTuning) -> Self {
        Self { profile, tuning }
    }

    pub fn profile(&self) -> &'static DeviceProfile {
        self.profile
    }

    /// Accumulates output until a prompt suffix terminates the last
    /// line, the idle window elapses with data buffered, or the
    /// deadline passes. On timeout the partial buffer is discarded.
    pub async fn read_until_complete(
        &self,
        transport: &mut (dyn Transport + '_),
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let started = Instant::now();
        let mut last_byte_at = started;
        let mut state = ReadState::AwaitingFirstByte;
        let mut buffer = String::new();

        loop {
            if started.elapsed() >= timeout {
                debug!(
                    "read timed out after {:?} with {} bytes buffered",
                    timeout,
                    buffer.len()
                );
                return Err(ExecError::Timeout);
            }

            let chunk = transport.poll_recv(self.tuning.recv_chunk).await?;
            if chunk.is_empty() {
                if state == ReadState::Accumulating
                    && last_byte_at.elapsed() >= self.tuning.idle_threshold
                    && !buffer.trim().is_empty()
                {
                    trace!("idle window elapsed, accepting {} bytes", buffer.len());
                    return Ok(buffer);
                }
                continue;
            }

            buffer.push_str(&String::from_utf8_lossy(&chunk));
            last_byte_at = Instant::now();
            state = ReadState::Accumulating;

            if response_complete(&buffer, self.profile.prompt_suffixes) {
                trace!("prompt matched after {} bytes", buffer.len());
                return Ok(buffer);
            }
        }
    }
}
