//! Banner-based device classification.
//!
//! Right after login most network devices print a banner and an initial
//! prompt. Draining that output serves two purposes at once: it keeps
//! login noise out of the first command's response and gives the
//! classifier its text to match on.

use std::time::{Duration, Instant};

use log::debug;

use crate::config::RECV_CHUNK;
use crate::profile::{self, ProfileKey};
use crate::transport::Transport;

/// Drains banner output for up to `settle` and classifies what arrived.
/// An unrecognized or empty banner yields [`ProfileKey::Generic`];
/// transport errors end the drain early but never fail detection.
pub async fn detect_profile(transport: &mut (dyn Transport + '_), settle: Duration) -> ProfileKey {
    let deadline = Instant::now() + settle;
    let mut banner = String::new();

    while Instant::now() < deadline {
        match transport.poll_recv(RECV_CHUNK).await {
            Ok(chunk) if chunk.is_empty() => {}
            Ok(chunk) => banner.push_str(&String::from_utf8_lossy(&chunk)),
            Err(err) => {
                debug!("banner drain stopped early: {err}");
                break;
            }
        }
    }

    let key = profile::classify(&banner);
    debug!("classified device as {} from {} banner bytes", key.as_str(), banner.len());
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;

    const QUANTUM: Duration = Duration::from_millis(2);
    const SETTLE: Duration = Duration::from_millis(40);

    #[tokio::test]
    async fn banner_text_selects_the_profile() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_chunk("Cisco IOS Software, Version 15.2\r\nRouter>");
        assert_eq!(detect_profile(&mut transport, SETTLE).await, ProfileKey::Cisco);
    }

    #[tokio::test]
    async fn split_banner_is_reassembled() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_chunk("MikroTik Router");
        script.push_chunk("OS 7.11\r\n[admin@gw] > ");
        assert_eq!(detect_profile(&mut transport, SETTLE).await, ProfileKey::Mikrotik);
    }

    #[tokio::test]
    async fn silent_device_falls_back_to_generic() {
        let (mut transport, _script) = ScriptedTransport::new(QUANTUM);
        assert_eq!(detect_profile(&mut transport, SETTLE).await, ProfileKey::Generic);
    }

    #[tokio::test]
    async fn transport_error_still_classifies() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_chunk("JUNOS 21.4R3");
        script.push_error("link reset");
        assert_eq!(detect_profile(&mut transport, SETTLE).await, ProfileKey::Juniper);
    }

    #[tokio::test]
    async fn detection_drains_the_banner() {
        let (mut transport, script) = ScriptedTransport::new(QUANTUM);
        script.push_chunk("Huawei VRP software\r\n<GW01>");
        detect_profile(&mut transport, SETTLE).await;
        assert!(transport.poll_recv(RECV_CHUNK).await.unwrap().is_empty());
    }
}
