use std::time::{Duration, Instant};

use log::{debug, info, trace};
use tokio::sync::Mutex;

use super::{MacroStepResult, SessionState, SessionTuning};
use crate::detect;
use crate::device::{self, DeviceInfo};
use crate::error::{ConnectError, ExecError};
use crate::profile::{self, DeviceProfile, ProfileKey};
use crate::prompt::{PromptEngine, ReadTuning, clean_output};
use crate::transport::{self, Endpoint, Transport};

struct Inner {
    transport: Option<Box<dyn Transport>>,
    profile: Option<&'static DeviceProfile>,
    state: SessionState,
}

/// One interactive session with one device.
///
/// All operations lock the session for their full duration, so
/// concurrent callers are serialized per command and never interleave
/// bytes on the wire.
pub struct Session {
    inner: Mutex<Inner>,
    tuning: SessionTuning,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_tuning(SessionTuning::default())
    }

    pub fn with_tuning(tuning: SessionTuning) -> Self {
        Self {
            inner: Mutex::new(Inner {
                transport: None,
                profile: None,
                state: SessionState::Disconnected,
            }),
            tuning,
        }
    }

    pub fn tuning(&self) -> &SessionTuning {
        &self.tuning
    }

    /// Opens a transport to the endpoint, classifies the device and
    /// disables output paging. Any previously held connection is torn
    /// down first; on failure the session is left cleanly disconnected.
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<ProfileKey, ConnectError> {
        let mut inner = self.inner.lock().await;
        Self::teardown(&mut inner).await;
        inner.state = SessionState::Connecting;
        info!("connecting to {}", endpoint.label());

        let result = match transport::open(endpoint, self.tuning.connect_timeout, self.tuning.poll_quantum)
            .await
        {
            Ok(transport) => self.prepare(&mut inner, transport).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(key) => {
                inner.state = SessionState::Connected;
                info!("{} connected as {} device", endpoint.label(), key.as_str());
                Ok(key)
            }
            Err(err) => {
                debug!("{} connect failed: {err}", endpoint.label());
                Self::teardown(&mut inner).await;
                Err(err)
            }
        }
    }

    /// Adopts an already open transport instead of dialing one. The
    /// detection and paging setup are identical to [`Session::connect`].
    pub async fn connect_transport(
        &self,
        transport: Box<dyn Transport>,
    ) -> Result<ProfileKey, ConnectError> {
        let mut inner = self.inner.lock().await;
        Self::teardown(&mut inner).await;
        inner.state = SessionState::Connecting;
        match self.prepare(&mut inner, transport).await {
            Ok(key) => {
                inner.state = SessionState::Connected;
                Ok(key)
            }
            Err(err) => {
                Self::teardown(&mut inner).await;
                Err(err)
            }
        }
    }

    async fn prepare(
        &self,
        inner: &mut Inner,
        mut transport: Box<dyn Transport>,
    ) -> Result<ProfileKey, ConnectError> {
        let key = detect::detect_profile(transport.as_mut(), self.tuning.settle_delay).await;
        let profile = profile::profile(key);
        let engine = PromptEngine::new(profile, self.read_tuning());

        for command in profile.paging_disable {
            trace!("disabling paging with {command:?}");
            let line = format!("{command}\n");
            transport
                .send(line.as_bytes())
                .await
                .map_err(|err| ConnectError::Protocol(err.to_string()))?;
            match engine
                .read_until_complete(transport.as_mut(), self.tuning.command_timeout)
                .await
            {
                Ok(_) => {}
                Err(ExecError::Timeout) => return Err(ConnectError::Timeout),
                Err(err) => return Err(ConnectError::Protocol(err.to_string())),
            }
            // Some devices echo a second prompt or a warning after the
            // paging change; soak it up so the first real command reads
            // clean.
            // A channel that dies here must fail the connect, not hand
            // the caller a session that is already dead.
            let deadline = Instant::now() + self.tuning.paging_settle_delay;
            while Instant::now() < deadline {
                transport
                    .poll_recv(self.tuning.recv_chunk)
                    .await
                    .map_err(|err| ConnectError::Protocol(err.to_string()))?;
            }
        }

        inner.transport = Some(transport);
        inner.profile = Some(profile);
        Ok(key)
    }

    /// Runs one command with the default command timeout.
    pub async fn execute_command(&self, command: &str) -> Result<String, ExecError> {
        self.execute_command_with_timeout(command, self.tuning.command_timeout)
            .await
    }

    /// Runs one command, returning its cleaned output. A timeout leaves
    /// the session connected; an I/O failure disconnects it.
    pub async fn execute_command_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        let mut inner = self.inner.lock().await;
        self.run_command(&mut inner, command, timeout).await
    }

    /// Runs a command sequence, continuing past failed steps. The
    /// session stays locked for the whole run so other callers cannot
    /// interleave commands into the middle of a macro.
    pub async fn execute_macro(
        &self,
        commands: &[String],
        timeout: Option<Duration>,
    ) -> Vec<MacroStepResult> {
        let timeout = timeout.unwrap_or(self.tuning.command_timeout);
        let mut inner = self.inner.lock().await;
        let mut results = Vec::with_capacity(commands.len());
        for (index, command) in commands.iter().enumerate() {
            match self.run_command(&mut inner, command, timeout).await {
                Ok(output) => results.push(MacroStepResult {
                    index,
                    command: command.clone(),
                    success: true,
                    output,
                    error: None,
                }),
                Err(err) => {
                    debug!("macro step {index} ({command:?}) failed: {err}");
                    results.push(MacroStepResult {
                        index,
                        command: command.clone(),
                        success: false,
                        output: String::new(),
                        error: Some(err.to_string()),
                    });
                }
            }
        }
        results
    }

    /// Runs the profile's version command and parses the result.
    pub async fn device_info(&self) -> Result<DeviceInfo, ExecError> {
        let mut inner = self.inner.lock().await;
        let profile = inner.profile.ok_or(ExecError::NotConnected)?;
        let output = self
            .run_command(&mut inner, profile.version_command, self.tuning.command_timeout)
            .await?;
        Ok(device::parse_device_info(profile.key, &output))
    }

    /// Closes the transport if one is held. Safe to call repeatedly and
    /// regardless of state.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        Self::teardown(&mut inner).await;
    }

    pub async fn is_connected(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.state == SessionState::Connected
            && inner.transport.as_ref().is_some_and(|t| t.is_open())
    }

    pub async fn profile_key(&self) -> Option<ProfileKey> {
        self.inner.lock().await.profile.map(|profile| profile.key)
    }

    fn read_tuning(&self) -> ReadTuning {
        ReadTuning {
            idle_threshold: self.tuning.idle_threshold,
            recv_chunk: self.tuning.recv_chunk,
        }
    }

    async fn run_command(
        &self,
        inner: &mut Inner,
        command: &str,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        if inner.state != SessionState::Connected {
            return Err(ExecError::NotConnected);
        }
        let profile = inner.profile.ok_or(ExecError::NotConnected)?;

        let result = {
            let transport = inner.transport.as_mut().ok_or(ExecError::NotConnected)?;
            self.exchange(transport.as_mut(), profile, command, timeout).await
        };
        match result {
            Ok(raw) => Ok(clean_output(&raw, command, profile.prompt_suffixes)),
            // Stale bytes from the timed-out read are drained before
            // the next command, so the session itself stays usable.
            Err(ExecError::Timeout) => Err(ExecError::Timeout),
            Err(err) => {
                debug!("transport failure during {command:?}, disconnecting: {err}");
                Self::teardown(inner).await;
                Err(err)
            }
        }
    }

    async fn exchange(
        &self,
        transport: &mut (dyn Transport + '_),
        profile: &'static DeviceProfile,
        command: &str,
        timeout: Duration,
    ) -> Result<String, ExecError> {
        // Leftovers from a previous timed-out command would otherwise
        // be attributed to this one.
        loop {
            let stale = transport.poll_recv(self.tuning.recv_chunk).await?;
            if stale.is_empty() {
                break;
            }
            trace!("discarded {} stale bytes before {command:?}", stale.len());
        }

        let line = format!("{}\n", command.trim_end());
        transport.send(line.as_bytes()).await?;

        let engine = PromptEngine::new(profile, self.read_tuning());
        engine.read_until_complete(transport, timeout).await
    }

    async fn teardown(inner: &mut Inner) {
        if let Some(mut transport) = inner.transport.take() {
            transport.close().await;
        }
        inner.profile = None;
        inner.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;

    fn fast_tuning() -> SessionTuning {
        SessionTuning {
            connect_timeout: Duration::from_millis(200),
            command_timeout: Duration::from_millis(200),
            settle_delay: Duration::from_millis(30),
            paging_settle_delay: Duration::from_millis(10),
            idle_threshold: Duration::from_millis(40),
            poll_quantum: Duration::from_millis(2),
            ..SessionTuning::default()
        }
    }

    #[tokio::test]
    async fn execute_without_connect_is_not_connected() {
        let session = Session::with_tuning(fast_tuning());
        assert_eq!(
            session.execute_command("show version").await,
            Err(ExecError::NotConnected)
        );
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn connect_classifies_and_disables_paging() {
        let session = Session::with_tuning(fast_tuning());
        let (transport, script) = ScriptedTransport::new(Duration::from_millis(2));
        script.push_chunk("Cisco IOS Software\r\nRouter>");
        script.push_on_send("terminal length 0\r\nRouter#");

        let key = session.connect_transport(Box::new(transport)).await.unwrap();
        assert_eq!(key, ProfileKey::Cisco);
        assert_eq!(session.profile_key().await, Some(ProfileKey::Cisco));
        assert_eq!(script.sent_text(), "terminal length 0\n");
        assert!(session.is_connected().await);
    }

    #[tokio::test]
    async fn failed_paging_setup_leaves_session_disconnected() {
        let session = Session::with_tuning(fast_tuning());
        let (transport, script) = ScriptedTransport::new(Duration::from_millis(2));
        script.push_chunk("Cisco IOS\r\nRouter>");
        // No reply ever arrives for the paging command.
        let result = session.connect_transport(Box::new(transport)).await;
        assert_eq!(result, Err(ConnectError::Timeout));
        assert!(!session.is_connected().await);
        assert_eq!(session.profile_key().await, None);
    }

    #[tokio::test]
    async fn transport_failure_after_paging_fails_the_connect() {
        let session = Session::with_tuning(fast_tuning());
        let (transport, script) = ScriptedTransport::new(Duration::from_millis(2));
        script.push_chunk("Cisco IOS\r\nRouter>");
        script.push_on_send("terminal length 0\r\nRouter#");
        script.push_error("connection reset");

        let result = session.connect_transport(Box::new(transport)).await;
        assert!(matches!(result, Err(ConnectError::Protocol(_))));
        assert!(!session.is_connected().await);
        assert_eq!(session.profile_key().await, None);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let session = Session::with_tuning(fast_tuning());
        session.disconnect().await;
        session.disconnect().await;
        assert!(!session.is_connected().await);
    }
}
