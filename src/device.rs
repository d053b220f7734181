//! Parsing of version-command output into structured device facts.

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::profile::{self, ProfileKey};

/// Facts extracted from a device's version output. Vendor always comes
/// from the profile; the rest is best effort and absent when the output
/// does not match a known pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceInfo {
    pub vendor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
}

struct FieldPatterns {
    model: &'static [&'static str],
    os_version: &'static [&'static str],
    hostname: &'static [&'static str],
    serial_number: &'static [&'static str],
    uptime: &'static [&'static str],
}

static CISCO_PATTERNS: FieldPatterns = FieldPatterns {
    model: &[r"(?i)cisco\s+(\S+)\s+(?:\(.*\)\s+)?processor", r"(?i)^cisco\s+(\S+)"],
    os_version: &[r"(?i)version\s+([^,\s]+)"],
    hostname: &[r"(?m)^(\S+)\s+uptime\s+is"],
    serial_number: &[r"(?i)processor board id\s+(\S+)", r"(?i)system serial number\s*:\s*(\S+)"],
    uptime: &[r"(?i)uptime is\s+(.+)"],
};

static JUNIPER_PATTERNS: FieldPatterns = FieldPatterns {
    model: &[r"(?i)model:\s*(\S+)"],
    os_version: &[r"(?i)junos:\s*(\S+)", r"(?i)junos .*\[([^\]]+)\]"],
    hostname: &[r"(?i)hostname:\s*(\S+)"],
    serial_number: &[r"(?i)serial number:\s*(\S+)"],
    uptime: &[r"(?i)up\s+(.+?),"],
};

static HUAWEI_PATTERNS: FieldPatterns = FieldPatterns {
    model: &[r"(?i)huawei\s+(\S+)\s+(?:router|switch)", r"(?i)quidway\s+(\S+)"],
    os_version: &[r"(?i)vrp.*software,?\s*version\s+([^\s(]+)"],
    hostname: &[],
    serial_number: &[],
    uptime: &[r"(?i)uptime is\s+(.+)"],
};

static MIKROTIK_PATTERNS: FieldPatterns = FieldPatterns {
    model: &[r"(?i)board-name:\s*(.+)"],
    os_version: &[r"(?i)version:\s*(\S+)"],
    hostname: &[],
    serial_number: &[r"(?i)serial-number:\s*(\S+)"],
    uptime: &[r"(?i)uptime:\s*(.+)"],
};

static GENERIC_PATTERNS: FieldPatterns = FieldPatterns {
    model: &[],
    os_version: &[r"(?i)version[:\s]+([^\s,]+)"],
    hostname: &[],
    serial_number: &[],
    uptime: &[r"(?i)uptime[:\s]+(.+)"],
};

static COMPILED: Lazy<Vec<(ProfileKey, CompiledPatterns)>> = Lazy::new(|| {
    [
        (ProfileKey::Cisco, &CISCO_PATTERNS),
        (ProfileKey::Juniper, &JUNIPER_PATTERNS),
        (ProfileKey::Huawei, &HUAWEI_PATTERNS),
        (ProfileKey::Mikrotik, &MIKROTIK_PATTERNS),
        (ProfileKey::Generic, &GENERIC_PATTERNS),
    ]
    .into_iter()
    .map(|(key, patterns)| (key, CompiledPatterns::compile(patterns)))
    .collect()
});

struct CompiledPatterns {
    model: Vec<Regex>,
    os_version: Vec<Regex>,
    hostname: Vec<Regex>,
    serial_number: Vec<Regex>,
    uptime: Vec<Regex>,
}

impl CompiledPatterns {
    fn compile(patterns: &FieldPatterns) -> Self {
        let build = |list: &[&str]| {
            list.iter()
                .map(|pattern| Regex::new(pattern).unwrap())
                .collect()
        };
        Self {
            model: build(patterns.model),
            os_version: build(patterns.os_version),
            hostname: build(patterns.hostname),
            serial_number: build(patterns.serial_number),
            uptime: build(patterns.uptime),
        }
    }
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    })
}

/// Extracts what it can from version output. Unmatched fields stay
/// `None`; this never fails.
pub fn parse_device_info(key: ProfileKey, output: &str) -> DeviceInfo {
    let compiled = COMPILED
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, compiled)| compiled)
        .unwrap_or_else(|| &COMPILED[COMPILED.len() - 1].1);
    DeviceInfo {
        vendor: profile::profile(key).vendor.to_string(),
        model: first_capture(&compiled.model, output),
        os_version: first_capture(&compiled.os_version, output),
        hostname: first_capture(&compiled.hostname, output),
        serial_number: first_capture(&compiled.serial_number, output),
        uptime: first_capture(&compiled.uptime, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CISCO_SHOW_VERSION: &str = "\
Cisco IOS Software, C2960 Software (C2960-LANBASEK9-M), Version 15.0(2)SE11
cisco WS-C2960-24TT-L (PowerPC405) processor (revision B0) with 65536K bytes of memory.
Processor board ID FOC1033Z1EV
core-sw1 uptime is 2 years, 11 weeks, 4 days";

    #[test]
    fn cisco_version_output_parses() {
        let info = parse_device_info(ProfileKey::Cisco, CISCO_SHOW_VERSION);
        assert_eq!(info.vendor, "Cisco");
        assert_eq!(info.model.as_deref(), Some("WS-C2960-24TT-L"));
        assert_eq!(info.os_version.as_deref(), Some("15.0(2)SE11"));
        assert_eq!(info.hostname.as_deref(), Some("core-sw1"));
        assert_eq!(info.serial_number.as_deref(), Some("FOC1033Z1EV"));
        assert_eq!(info.uptime.as_deref(), Some("2 years, 11 weeks, 4 days"));
    }

    #[test]
    fn juniper_version_output_parses() {
        let output = "Hostname: edge1\nModel: mx204\nJunos: 21.4R3.15\n";
        let info = parse_device_info(ProfileKey::Juniper, output);
        assert_eq!(info.vendor, "Juniper");
        assert_eq!(info.hostname.as_deref(), Some("edge1"));
        assert_eq!(info.model.as_deref(), Some("mx204"));
        assert_eq!(info.os_version.as_deref(), Some("21.4R3.15"));
    }

    #[test]
    fn mikrotik_resource_print_parses() {
        let output = "  uptime: 1w3d5h\n  version: 7.11.2 (stable)\n  board-name: RB4011iGS+\n";
        let info = parse_device_info(ProfileKey::Mikrotik, output);
        assert_eq!(info.vendor, "MikroTik");
        assert_eq!(info.os_version.as_deref(), Some("7.11.2"));
        assert_eq!(info.model.as_deref(), Some("RB4011iGS+"));
        assert_eq!(info.uptime.as_deref(), Some("1w3d5h"));
    }

    #[test]
    fn unmatched_output_leaves_fields_empty() {
        let info = parse_device_info(ProfileKey::Generic, "no useful text here");
        assert!(info.model.is_none());
        assert!(info.os_version.is_none());
    }
}
