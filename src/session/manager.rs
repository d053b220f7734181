use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot};

use super::{ExecJob, MacroStepResult, Session, SessionTuning};
use crate::error::{ConnectError, ExecError};
use crate::transport::{ConnectionSecurityOptions, Endpoint};

const POOL_CAPACITY: u64 = 100;
const POOL_IDLE: Duration = Duration::from_secs(300);
const JOB_QUEUE_DEPTH: usize = 32;

/// A pooled session plus the queue feeding its worker task. Cloning is
/// cheap; all clones talk to the same device connection.
#[derive(Clone)]
pub struct PooledSession {
    sender: mpsc::Sender<ExecJob>,
    session: Arc<Session>,
    credentials: Option<[u8; 32]>,
    security: Option<ConnectionSecurityOptions>,
}

impl PooledSession {
    /// Wraps a connected session in a worker task that executes queued
    /// jobs one at a time. The worker disconnects the session once every
    /// handle is gone.
    pub fn spawn(
        session: Arc<Session>,
        credentials: Option<[u8; 32]>,
        security: Option<ConnectionSecurityOptions>,
    ) -> PooledSession {
        let (sender, mut jobs) = mpsc::channel::<ExecJob>(JOB_QUEUE_DEPTH);
        let worker = session.clone();
        tokio::spawn(async move {
            while let Some(job) = jobs.recv().await {
                let result = match job.timeout {
                    Some(timeout) => worker.execute_command_with_timeout(&job.command, timeout).await,
                    None => worker.execute_command(&job.command).await,
                };
                // A dropped responder only means the caller gave up.
                let _ = job.responder.send(result);
            }
            debug!("session worker draining, disconnecting");
            worker.disconnect().await;
        });
        Self {
            sender,
            session,
            credentials,
            security,
        }
    }

    /// Queues one command on the worker and waits for its output.
    pub async fn execute(
        &self,
        command: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<String, ExecError> {
        let (responder, response) = oneshot::channel();
        let job = ExecJob {
            command: command.into(),
            timeout,
            responder,
        };
        self.sender
            .send(job)
            .await
            .map_err(|_| ExecError::NotConnected)?;
        response.await.map_err(|_| ExecError::NotConnected)?
    }

    /// Runs a macro directly on the session, bypassing the job queue so
    /// the steps stay contiguous.
    pub async fn execute_macro(
        &self,
        commands: &[String],
        timeout: Option<Duration>,
    ) -> Vec<MacroStepResult> {
        self.session.execute_macro(commands, timeout).await
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn reusable_for(
        &self,
        credentials: &Option<[u8; 32]>,
        security: &Option<ConnectionSecurityOptions>,
    ) -> bool {
        self.credentials == *credentials && self.security == *security
    }
}

/// Pool of live sessions keyed by endpoint label. Entries idle out
/// after five minutes; eviction drops the worker's last sender, which
/// lets the worker task disconnect cleanly.
pub struct SessionManager {
    pool: Cache<String, PooledSession>,
    tuning: SessionTuning,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_tuning(SessionTuning::default())
    }

    pub fn with_tuning(tuning: SessionTuning) -> Self {
        Self {
            pool: Cache::builder()
                .max_capacity(POOL_CAPACITY)
                .time_to_idle(POOL_IDLE)
                .build(),
            tuning,
        }
    }

    /// Returns a live session for the endpoint, reusing a pooled one
    /// when it is still connected and was opened with the same
    /// credentials and security options.
    pub async fn get(&self, endpoint: &Endpoint) -> Result<PooledSession, ConnectError> {
        let tuning = self.tuning;
        self.get_with(
            endpoint.label(),
            credentials_digest(endpoint),
            security_options(endpoint),
            || async move {
                let session = Arc::new(Session::with_tuning(tuning));
                session.connect(endpoint).await?;
                Ok(session)
            },
        )
        .await
    }

    /// Pool lookup with an injectable connect step. `connect` runs only
    /// on a pool miss or when the pooled entry is stale or was opened
    /// under different credentials or security options; a stale or
    /// mismatched entry is disconnected and replaced.
    pub async fn get_with<F, Fut>(
        &self,
        key: String,
        credentials: Option<[u8; 32]>,
        security: Option<ConnectionSecurityOptions>,
        connect: F,
    ) -> Result<PooledSession, ConnectError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<Session>, ConnectError>>,
    {
        if let Some(pooled) = self.pool.get(&key).await {
            if pooled.reusable_for(&credentials, &security) && pooled.session.is_connected().await {
                debug!("{key} reusing pooled session");
                return Ok(pooled);
            }
            debug!("{key} pooled session stale or parameters changed, replacing");
            pooled.session.disconnect().await;
            self.pool.invalidate(&key).await;
        }

        let session = connect().await?;
        let pooled = PooledSession::spawn(session, credentials, security);
        self.pool.insert(key.clone(), pooled.clone()).await;
        info!("{key} added to session pool");
        Ok(pooled)
    }

    /// Disconnects and drops the pooled session for an endpoint, if any.
    pub async fn evict(&self, endpoint: &Endpoint) {
        let key = endpoint.label();
        if let Some(pooled) = self.pool.get(&key).await {
            pooled.session.disconnect().await;
        }
        self.pool.invalidate(&key).await;
    }
}

/// Digest of the secret part of the endpoint parameters, compared on
/// reuse so a password change forces a fresh login.
fn credentials_digest(endpoint: &Endpoint) -> Option<[u8; 32]> {
    match endpoint {
        Endpoint::Ssh(params) => {
            let mut hasher = Sha256::new();
            hasher.update(params.username.as_bytes());
            hasher.update([0]);
            hasher.update(params.password.as_bytes());
            Some(hasher.finalize().into())
        }
        Endpoint::Telnet(_) | Endpoint::Serial(_) => None,
    }
}

/// Security options the endpoint was asked for, compared on reuse so a
/// connection negotiated under a weaker tier is never handed to a
/// caller that requested a stricter one.
fn security_options(endpoint: &Endpoint) -> Option<ConnectionSecurityOptions> {
    match endpoint {
        Endpoint::Ssh(params) => Some(params.security.clone()),
        Endpoint::Telnet(_) | Endpoint::Serial(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::transport::{ScriptedTransport, SshParams};

    fn fast_tuning() -> SessionTuning {
        SessionTuning {
            command_timeout: Duration::from_millis(200),
            settle_delay: Duration::from_millis(30),
            paging_settle_delay: Duration::from_millis(10),
            idle_threshold: Duration::from_millis(40),
            poll_quantum: Duration::from_millis(2),
            ..SessionTuning::default()
        }
    }

    async fn connected_session() -> Arc<Session> {
        let session = Arc::new(Session::with_tuning(fast_tuning()));
        let (transport, script) = ScriptedTransport::new(Duration::from_millis(2));
        script.push_chunk("MikroTik RouterOS 7.11\r\n[admin@gw] > ");
        session.connect_transport(Box::new(transport)).await.unwrap();
        session
    }

    fn digest(seed: u8) -> Option<[u8; 32]> {
        Some([seed; 32])
    }

    #[tokio::test]
    async fn worker_executes_queued_jobs_in_order() {
        let session = Arc::new(Session::with_tuning(fast_tuning()));
        let (transport, script) = ScriptedTransport::new(Duration::from_millis(2));
        script.push_chunk("RouterOS 7.11\r\n[admin@gw] > ");
        session.connect_transport(Box::new(transport)).await.unwrap();

        script.push_on_send("/system identity print\r\n  name: gw\r\n[admin@gw] > ");
        script.push_on_send("/ip address print\r\n0 10.0.0.1/24\r\n[admin@gw] > ");

        let pooled = PooledSession::spawn(session, None, None);
        let first = pooled.execute("/system identity print", None).await.unwrap();
        let second = pooled.execute("/ip address print", None).await.unwrap();
        assert_eq!(first, "  name: gw");
        assert_eq!(second, "0 10.0.0.1/24");
    }

    #[tokio::test]
    async fn execute_on_disconnected_session_fails() {
        let session = Arc::new(Session::with_tuning(fast_tuning()));
        let pooled = PooledSession::spawn(session, None, None);
        assert_eq!(
            pooled.execute("show version", None).await,
            Err(ExecError::NotConnected)
        );
    }

    #[tokio::test]
    async fn pool_reuses_a_live_matching_session() {
        let manager = SessionManager::with_tuning(fast_tuning());
        let first = connected_session().await;
        manager
            .get_with("gw".to_string(), digest(1), None, || {
                let first = first.clone();
                async move { Ok(first) }
            })
            .await
            .unwrap();

        let dialed = Cell::new(false);
        let pooled = manager
            .get_with("gw".to_string(), digest(1), None, || async {
                dialed.set(true);
                Ok(connected_session().await)
            })
            .await
            .unwrap();
        assert!(!dialed.get());
        assert!(pooled.session().is_connected().await);
    }

    #[tokio::test]
    async fn password_change_replaces_the_pooled_session() {
        let manager = SessionManager::with_tuning(fast_tuning());
        let first = connected_session().await;
        manager
            .get_with("gw".to_string(), digest(1), None, || {
                let first = first.clone();
                async move { Ok(first) }
            })
            .await
            .unwrap();

        let dialed = Cell::new(false);
        manager
            .get_with("gw".to_string(), digest(2), None, || async {
                dialed.set(true);
                Ok(connected_session().await)
            })
            .await
            .unwrap();
        assert!(dialed.get());
        // The superseded session was torn down, not leaked half-open.
        assert!(!first.is_connected().await);
    }

    #[tokio::test]
    async fn security_downgrade_is_not_reused_for_a_strict_caller() {
        let manager = SessionManager::with_tuning(fast_tuning());
        let legacy = Some(ConnectionSecurityOptions::legacy_compatible());
        let strict = Some(ConnectionSecurityOptions::default());

        let first = connected_session().await;
        manager
            .get_with("gw".to_string(), digest(1), legacy, || {
                let first = first.clone();
                async move { Ok(first) }
            })
            .await
            .unwrap();

        let dialed = Cell::new(false);
        manager
            .get_with("gw".to_string(), digest(1), strict, || async {
                dialed.set(true);
                Ok(connected_session().await)
            })
            .await
            .unwrap();
        assert!(dialed.get());
        assert!(!first.is_connected().await);
    }

    #[tokio::test]
    async fn disconnected_pool_entry_is_replaced() {
        let manager = SessionManager::with_tuning(fast_tuning());
        let first = connected_session().await;
        manager
            .get_with("gw".to_string(), digest(1), None, || {
                let first = first.clone();
                async move { Ok(first) }
            })
            .await
            .unwrap();
        first.disconnect().await;

        let dialed = Cell::new(false);
        let pooled = manager
            .get_with("gw".to_string(), digest(1), None, || async {
                dialed.set(true);
                Ok(connected_session().await)
            })
            .await
            .unwrap();
        assert!(dialed.get());
        assert!(pooled.session().is_connected().await);
    }

    #[test]
    fn credential_digest_tracks_the_password() {
        let a = Endpoint::Ssh(SshParams::new("r1", "admin", "old"));
        let b = Endpoint::Ssh(SshParams::new("r1", "admin", "new"));
        let c = Endpoint::Ssh(SshParams::new("r1", "admin", "old"));
        assert_ne!(credentials_digest(&a), credentials_digest(&b));
        assert_eq!(credentials_digest(&a), credentials_digest(&c));
    }

    #[test]
    fn endpoint_security_options_only_apply_to_ssh() {
        let ssh = Endpoint::Ssh(
            SshParams::new("r1", "admin", "pw")
                .with_security(ConnectionSecurityOptions::legacy_compatible()),
        );
        assert_eq!(
            security_options(&ssh),
            Some(ConnectionSecurityOptions::legacy_compatible())
        );
        let telnet = Endpoint::Telnet(crate::transport::TelnetParams::new("r2"));
        assert_eq!(security_options(&telnet), None);
    }
}
