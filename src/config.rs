//! Default ports, timing parameters and SSH algorithm preference tables.
//!
//! Network gear in the field ranges from current releases to firmware that
//! only speaks SHA1-era key exchange, so the SSH tables come in three
//! tiers selected through
//! [`SecurityLevel`](crate::transport::SecurityLevel).

use std::borrow::Cow;
use std::time::Duration;

use russh::keys::{Algorithm, EcdsaCurve, HashAlg};
use russh::{Preferred, cipher, compression, kex, mac};

use crate::transport::SecurityLevel;

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default Telnet port.
pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Default serial line speed.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default timeout for the whole connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait after channel establishment before trusting the banner is
/// complete. Doubles as the device-detection window.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Default wait after sending the paging-disable commands.
pub const DEFAULT_PAGING_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Default idle gap after which a non-empty response buffer is considered
/// complete even without a prompt match.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(2);

/// Upper bound on how long a single receive poll may block. This bounds the
/// granularity at which the read loop can check for completion.
pub const DEFAULT_POLL_QUANTUM: Duration = Duration::from_millis(100);

/// Maximum bytes requested per receive poll.
pub const RECV_CHUNK: usize = 4096;

/// Key exchange algorithms for the secure tier.
pub const SECURE_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_G16_SHA512,
    kex::DH_G15_SHA512,
    kex::DH_G14_SHA256,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
];

/// Key exchange algorithms for the balanced tier. Adds group-exchange and
/// SHA1 group-14 for mid-2010s firmware.
pub const BALANCED_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_GEX_SHA256,
    kex::DH_G16_SHA512,
    kex::DH_G15_SHA512,
    kex::DH_G14_SHA256,
    kex::DH_G14_SHA1,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
];

/// Key exchange algorithms for the legacy tier, broadest first-contact set.
pub const LEGACY_KEX_ORDER: &[kex::Name] = &[
    kex::CURVE25519,
    kex::CURVE25519_PRE_RFC_8731,
    kex::DH_GEX_SHA1,
    kex::DH_GEX_SHA256,
    kex::DH_G1_SHA1,
    kex::DH_G14_SHA1,
    kex::DH_G14_SHA256,
    kex::DH_G15_SHA512,
    kex::DH_G16_SHA512,
    kex::DH_G17_SHA512,
    kex::DH_G18_SHA512,
    kex::ECDH_SHA2_NISTP256,
    kex::ECDH_SHA2_NISTP384,
    kex::ECDH_SHA2_NISTP521,
    kex::NONE,
];

/// Host key algorithms for the secure tier.
pub const SECURE_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
];

/// Host key algorithms for the balanced tier. Adds plain ssh-rsa.
pub const BALANCED_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Ed25519,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::Rsa { hash: None },
];

/// Host key algorithms for the legacy tier, including DSA.
pub const LEGACY_KEY_TYPES: &[Algorithm] = &[
    Algorithm::Dsa,
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP256,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP384,
    },
    Algorithm::Ecdsa {
        curve: EcdsaCurve::NistP521,
    },
    Algorithm::Ed25519,
    Algorithm::Rsa { hash: None },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha256),
    },
    Algorithm::Rsa {
        hash: Some(HashAlg::Sha512),
    },
    Algorithm::SkEcdsaSha2NistP256,
    Algorithm::SkEd25519,
];

/// Ciphers for the secure tier.
pub static SECURE_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
];

/// Ciphers for the balanced tier. Adds CBC modes still common on switches.
pub static BALANCED_CIPHERS: &[cipher::Name] = &[
    cipher::CHACHA20_POLY1305,
    cipher::AES_256_GCM,
    cipher::AES_256_CTR,
    cipher::AES_192_CTR,
    cipher::AES_128_CTR,
    cipher::AES_256_CBC,
    cipher::AES_192_CBC,
    cipher::AES_128_CBC,
];

/// Ciphers for the legacy tier.
pub static LEGACY_CIPHERS: &[cipher::Name] = &[
    cipher::CLEAR,
    cipher::NONE,
    cipher::AES_128_CTR,
    cipher::AES_192_CTR,
    cipher::AES_256_CTR,
    cipher::AES_256_GCM,
    cipher::AES_128_CBC,
    cipher::AES_192_CBC,
    cipher::AES_256_CBC,
    cipher::CHACHA20_POLY1305,
];

/// MAC algorithms for the secure tier.
pub const SECURE_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256,
    mac::HMAC_SHA512,
];

/// MAC algorithms for the balanced tier. Adds SHA1 variants.
pub const BALANCED_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512_ETM,
    mac::HMAC_SHA256,
    mac::HMAC_SHA512,
    mac::HMAC_SHA1_ETM,
    mac::HMAC_SHA1,
];

/// MAC algorithms for the legacy tier.
pub const LEGACY_MAC_ALGORITHMS: &[mac::Name] = &[
    mac::NONE,
    mac::HMAC_SHA1,
    mac::HMAC_SHA256,
    mac::HMAC_SHA512,
    mac::HMAC_SHA1_ETM,
    mac::HMAC_SHA256_ETM,
    mac::HMAC_SHA512_ETM,
];

/// Compression algorithms shared by all tiers.
pub const DEFAULT_COMPRESSION_ALGORITHMS: &[compression::Name] = &[
    compression::NONE,
    compression::ZLIB,
    compression::ZLIB_LEGACY,
];

/// Assembles the full negotiation preference set for a tier.
pub fn algorithm_preferences(level: SecurityLevel) -> Preferred {
    match level {
        SecurityLevel::Secure => Preferred {
            kex: Cow::Borrowed(SECURE_KEX_ORDER),
            key: Cow::Borrowed(SECURE_KEY_TYPES),
            cipher: Cow::Borrowed(SECURE_CIPHERS),
            mac: Cow::Borrowed(SECURE_MAC_ALGORITHMS),
            compression: Cow::Borrowed(DEFAULT_COMPRESSION_ALGORITHMS),
        },
        SecurityLevel::Balanced => Preferred {
            kex: Cow::Borrowed(BALANCED_KEX_ORDER),
            key: Cow::Borrowed(BALANCED_KEY_TYPES),
            cipher: Cow::Borrowed(BALANCED_CIPHERS),
            mac: Cow::Borrowed(BALANCED_MAC_ALGORITHMS),
            compression: Cow::Borrowed(DEFAULT_COMPRESSION_ALGORITHMS),
        },
        SecurityLevel::LegacyCompatible => Preferred {
            kex: Cow::Borrowed(LEGACY_KEX_ORDER),
            key: Cow::Borrowed(LEGACY_KEY_TYPES),
            cipher: Cow::Borrowed(LEGACY_CIPHERS),
            mac: Cow::Borrowed(LEGACY_MAC_ALGORITHMS),
            compression: Cow::Borrowed(DEFAULT_COMPRESSION_ALGORITHMS),
        },
    }
}
