//! Negotiation policy for SSH endpoints.
//!
//! Field gear spans a decade of firmware, so callers pick a tier rather
//! than individual algorithms. The per-tier preference tables live in
//! [`crate::config`]; this module only binds a tier to a host-key
//! verification method.

use async_ssh2_tokio::ServerCheckMethod;
use russh::Preferred;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config;

/// Algorithm negotiation tier, strictest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Modern algorithms only.
    Secure,
    /// Modern first, plus fallbacks common on mid-2010s firmware.
    Balanced,
    /// Everything the stack can speak, oldest gear included.
    LegacyCompatible,
}

/// How an SSH endpoint negotiates algorithms and verifies the host key.
///
/// Sessions opened under different options must never be substituted
/// for one another; the pool compares these on reuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSecurityOptions {
    pub level: SecurityLevel,
    pub server_check: ServerCheckMethod,
}

impl Default for ConnectionSecurityOptions {
    fn default() -> Self {
        Self {
            level: SecurityLevel::Secure,
            server_check: ServerCheckMethod::DefaultKnownHostsFile,
        }
    }
}

impl ConnectionSecurityOptions {
    /// Wider algorithm set, host key still checked against known_hosts.
    pub fn balanced() -> Self {
        Self {
            level: SecurityLevel::Balanced,
            ..Self::default()
        }
    }

    /// Broadest algorithm set with host-key checking disabled. Meant for
    /// console servers and lab gear with ephemeral keys.
    pub fn legacy_compatible() -> Self {
        Self {
            level: SecurityLevel::LegacyCompatible,
            server_check: ServerCheckMethod::NoCheck,
        }
    }

    pub(super) fn preferred(&self) -> Preferred {
        config::algorithm_preferences(self.level)
    }
}
