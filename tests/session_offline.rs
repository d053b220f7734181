//! End-to-end session behavior against a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use rnetshell::error::ExecError;
use rnetshell::profile::ProfileKey;
use rnetshell::session::{Session, SessionTuning};
use rnetshell::transport::{ScriptController, ScriptedTransport, Transport};

const QUANTUM: Duration = Duration::from_millis(2);

fn fast_tuning() -> SessionTuning {
    SessionTuning {
        connect_timeout: Duration::from_millis(300),
        command_timeout: Duration::from_millis(300),
        settle_delay: Duration::from_millis(30),
        paging_settle_delay: Duration::from_millis(10),
        idle_threshold: Duration::from_millis(50),
        poll_quantum: QUANTUM,
        ..SessionTuning::default()
    }
}

async fn connected_cisco(session: &Session) -> ScriptController {
    let (transport, script) = ScriptedTransport::new(QUANTUM);
    script.push_chunk("Cisco IOS Software, Version 15.2\r\nRouter>");
    script.push_on_send("terminal length 0\r\nRouter#");
    let key = session.connect_transport(Box::new(transport)).await.unwrap();
    assert_eq!(key, ProfileKey::Cisco);
    script
}

async fn connected_mikrotik(session: &Session) -> ScriptController {
    let (transport, script) = ScriptedTransport::new(QUANTUM);
    script.push_chunk("MikroTik RouterOS 7.11\r\n[admin@gw] > ");
    let key = session.connect_transport(Box::new(transport)).await.unwrap();
    assert_eq!(key, ProfileKey::Mikrotik);
    script
}

#[tokio::test]
async fn connect_sends_paging_disable_and_drains_the_banner() {
    let session = Session::with_tuning(fast_tuning());
    let script = connected_cisco(&session).await;
    assert_eq!(script.sent_text(), "terminal length 0\n");

    // The banner and the paging exchange must not leak into the first
    // command's output.
    script.push_on_send("show version\r\nCisco IOS Software\r\nRouter#");
    let output = session.execute_command("show version").await.unwrap();
    assert_eq!(output, "Cisco IOS Software");
}

#[tokio::test]
async fn command_timeout_discards_partial_output() {
    let mut tuning = fast_tuning();
    tuning.idle_threshold = Duration::from_secs(30);
    let session = Session::with_tuning(tuning);
    let script = connected_mikrotik(&session).await;

    // A fragment arrives but no prompt ever does.
    script.push_on_send("interrupted transfer");
    let result = session
        .execute_command_with_timeout("/export", Duration::from_millis(80))
        .await;
    assert_eq!(result, Err(ExecError::Timeout));
    assert!(session.is_connected().await);

    // The stale fragment is drained, not attributed to the next command.
    script.push_on_send("/ip address print\r\n0 10.0.0.1/24\r\n[admin@gw] > ");
    let output = session
        .execute_command_with_timeout("/ip address print", Duration::from_millis(250))
        .await
        .unwrap();
    assert_eq!(output, "0 10.0.0.1/24");
}

#[tokio::test]
async fn concurrent_commands_are_serialized_per_command() {
    let session = Arc::new(Session::with_tuning(fast_tuning()));
    let script = connected_mikrotik(&session).await;
    script.push_on_send("out-1\r\n[admin@gw] > ");
    script.push_on_send("out-2\r\n[admin@gw] > ");

    let a = tokio::spawn({
        let session = session.clone();
        async move { session.execute_command("cmd-a").await.unwrap() }
    });
    let b = tokio::spawn({
        let session = session.clone();
        async move { session.execute_command("cmd-b").await.unwrap() }
    });
    let mut outputs = vec![a.await.unwrap(), b.await.unwrap()];
    outputs.sort();
    assert_eq!(outputs, vec!["out-1".to_string(), "out-2".to_string()]);

    // Each command line was written whole; the two writes never
    // interleaved on the wire.
    let sent = script.sent();
    assert_eq!(sent.len(), 2);
    for chunk in sent {
        let line = String::from_utf8(chunk).unwrap();
        assert!(line == "cmd-a\n" || line == "cmd-b\n");
    }
}

#[tokio::test]
async fn macro_continues_past_failures_and_reports_per_step() {
    let session = Session::with_tuning(fast_tuning());
    let script = connected_mikrotik(&session).await;
    script.push_on_send("ok output\r\n[admin@gw] > ");
    // RouterOS needs no paging setup, so the macro's steps are writes
    // zero, one and two. The second write fails.
    script.fail_on_send(1);

    let commands = vec![
        "/system identity print".to_string(),
        "/file print".to_string(),
        "/ip route print".to_string(),
    ];
    let results = session.execute_macro(&commands, None).await;
    assert_eq!(results.len(), 3);

    assert!(results[0].success);
    assert_eq!(results[0].output, "ok output");
    assert!(results[0].error.is_none());

    assert!(!results[1].success);
    assert!(results[1].error.as_deref().unwrap().contains("i/o failure"));

    // The send failure disconnected the session, so the last step fails
    // fast without touching the wire.
    assert!(!results[2].success);
    assert_eq!(
        results[2].error.as_deref(),
        Some(ExecError::NotConnected.to_string().as_str())
    );
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn session_reconnects_after_disconnect() {
    let session = Session::with_tuning(fast_tuning());
    connected_mikrotik(&session).await;
    assert!(session.is_connected().await);

    session.disconnect().await;
    session.disconnect().await;
    assert!(!session.is_connected().await);
    assert_eq!(
        session.execute_command("/ping 10.0.0.1").await,
        Err(ExecError::NotConnected)
    );

    let script = connected_cisco(&session).await;
    assert_eq!(session.profile_key().await, Some(ProfileKey::Cisco));
    script.push_on_send("show clock\r\n10:04:01.123 UTC\r\nRouter#");
    let output = session.execute_command("show clock").await.unwrap();
    assert_eq!(output, "10:04:01.123 UTC");
}

#[tokio::test]
async fn io_failure_during_read_disconnects_the_session() {
    let session = Session::with_tuning(fast_tuning());
    let script = connected_mikrotik(&session).await;
    script.push_on_send("partial line");
    script.push_error("connection reset");

    let result = session.execute_command("/export").await;
    assert!(matches!(result, Err(ExecError::Io(_))));
    assert!(!session.is_connected().await);
}

#[tokio::test]
async fn unknown_banner_falls_back_to_generic_profile() {
    let session = Session::with_tuning(fast_tuning());
    let (transport, script) = ScriptedTransport::new(QUANTUM);
    script.push_chunk("Welcome to firmware v3\r\nbox$ ");
    script.push_on_send("terminal length 0\r\nbox$ ");

    let key = session.connect_transport(Box::new(transport)).await.unwrap();
    assert_eq!(key, ProfileKey::Generic);

    script.push_on_send("uname\r\nfirmware v3\r\nbox$ ");
    let output = session.execute_command("uname").await.unwrap();
    assert_eq!(output, "firmware v3");
}

#[tokio::test]
async fn closed_transport_reports_not_open() {
    let (mut transport, _script) = ScriptedTransport::new(QUANTUM);
    assert!(transport.is_open());
    transport.close().await;
    transport.close().await;
    assert!(!transport.is_open());
    assert!(transport.send(b"late\n").await.is_err());
}
