//! Static per-vendor device profiles.
//!
//! A profile bundles everything the session layer needs to know about a
//! vendor's CLI: the banner keywords that identify it, the commands that
//! disable output paging, the prompt terminator suffixes that signal
//! "ready for input", and the canonical version-query command.
//!
//! The registry is read-only shared state and safe for concurrent lookup
//! from any number of sessions. Lookup is a total function: every key
//! resolves, and classification falls back to [`ProfileKey::Generic`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identity of a registered device profile.
///
/// A closed enum rather than a free-form string, so the registry lookup is
/// exhaustive and checked at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKey {
    Cisco,
    Juniper,
    Huawei,
    Mikrotik,
    Generic,
}

impl ProfileKey {
    /// Stable lowercase name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKey::Cisco => "cisco",
            ProfileKey::Juniper => "juniper",
            ProfileKey::Huawei => "huawei",
            ProfileKey::Mikrotik => "mikrotik",
            ProfileKey::Generic => "generic",
        }
    }
}

/// Immutable per-vendor configuration.
#[derive(Debug)]
pub struct DeviceProfile {
    pub key: ProfileKey,
    /// Human-readable vendor name.
    pub vendor: &'static str,
    /// Case-insensitive banner keywords that select this profile.
    markers: &'static [&'static str],
    /// Commands sent right after connect to disable output paging,
    /// in order. May be empty for vendors without an interactive pager.
    pub paging_disable: &'static [&'static str],
    /// Prompt terminator suffixes, checked in registration order.
    pub prompt_suffixes: &'static [&'static str],
    /// Canonical "show version"-equivalent command.
    pub version_command: &'static str,
}

static CISCO: DeviceProfile = DeviceProfile {
    key: ProfileKey::Cisco,
    vendor: "Cisco",
    markers: &["cisco", "ios", "nx-os", "asa", "catalyst"],
    paging_disable: &["terminal length 0"],
    prompt_suffixes: &["#", ">"],
    version_command: "show version",
};

static JUNIPER: DeviceProfile = DeviceProfile {
    key: ProfileKey::Juniper,
    vendor: "Juniper",
    markers: &["junos", "juniper"],
    paging_disable: &["set cli screen-length 0"],
    prompt_suffixes: &["#", ">", "%"],
    version_command: "show version",
};

static HUAWEI: DeviceProfile = DeviceProfile {
    key: ProfileKey::Huawei,
    vendor: "Huawei",
    markers: &["vrp", "huawei", "quidway"],
    paging_disable: &["screen-length 0 temporary"],
    prompt_suffixes: &[">", "]"],
    version_command: "display version",
};

static MIKROTIK: DeviceProfile = DeviceProfile {
    key: ProfileKey::Mikrotik,
    vendor: "MikroTik",
    // RouterOS does not page unattended output, hence no paging commands.
    markers: &["routeros", "mikrotik"],
    paging_disable: &[],
    prompt_suffixes: &[">"],
    version_command: "/system resource print",
};

static GENERIC: DeviceProfile = DeviceProfile {
    key: ProfileKey::Generic,
    vendor: "Unknown",
    markers: &[],
    paging_disable: &["terminal length 0"],
    prompt_suffixes: &["#", ">", "$", "%"],
    version_command: "show version",
};

/// Classification order. Specific vendors are checked before the generic
/// fallback; within the list, first match wins.
static CLASSIFY_ORDER: &[&DeviceProfile] = &[&CISCO, &JUNIPER, &HUAWEI, &MIKROTIK];

/// Classifies an initial banner against the registered vendor markers.
///
/// Matching is a case-insensitive substring check. A banner matching no
/// profile, including the empty banner, classifies as
/// [`ProfileKey::Generic`]; this function never fails.
pub fn classify(banner: &str) -> ProfileKey {
    let haystack = banner.to_ascii_lowercase();
    for profile in CLASSIFY_ORDER {
        if profile
            .markers
            .iter()
            .any(|marker| haystack.contains(marker))
        {
            return profile.key;
        }
    }
    ProfileKey::Generic
}

/// Resolves a key to its profile. Total: every key is registered.
pub fn profile(key: ProfileKey) -> &'static DeviceProfile {
    match key {
        ProfileKey::Cisco => &CISCO,
        ProfileKey::Juniper => &JUNIPER,
        ProfileKey::Huawei => &HUAWEI,
        ProfileKey::Mikrotik => &MIKROTIK,
        ProfileKey::Generic => &GENERIC,
    }
}
