//! Error types for connection establishment and command execution.
//!
//! Both enums are closed: callers can pattern-match every failure mode
//! instead of inspecting error messages. Device-type detection is
//! deliberately infallible and has no error type of its own.

use thiserror::Error;

/// Errors that can occur while establishing a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The endpoint could not be reached (refused, unresolvable, no route).
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The connection attempt did not complete within the connect timeout.
    #[error("connection attempt timed out")]
    Timeout,

    /// The remote side rejected the supplied credentials.
    #[error("authentication failed")]
    AuthFailed,

    /// The transport was reachable but the protocol handshake or channel
    /// setup failed. Also covers I/O failures during paging suppression,
    /// which leave the session torn down rather than half-open.
    #[error("protocol failure: {0}")]
    Protocol(String),
}

/// Errors that can occur while executing a command on a live session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The session is not connected. Returned immediately, without touching
    /// the transport.
    #[error("not connected to a device")]
    NotConnected,

    /// No prompt match and no idle fallback fired before the command
    /// timeout elapsed. Partial output is discarded, never returned.
    #[error("command timed out before output completed")]
    Timeout,

    /// The channel failed mid-command. The session transitions to
    /// disconnected; subsequent calls fail fast with [`ExecError::NotConnected`].
    #[error("channel i/o failure: {0}")]
    Io(String),
}

/// Maps an OS-level connect failure onto the closed [`ConnectError`] set.
pub(crate) fn classify_io_connect(err: &std::io::Error) -> ConnectError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::TimedOut => ConnectError::Timeout,
        ErrorKind::ConnectionRefused
        | ErrorKind::HostUnreachable
        | ErrorKind::NetworkUnreachable
        | ErrorKind::AddrNotAvailable
        | ErrorKind::NotFound => ConnectError::Unreachable(err.to_string()),
        _ => ConnectError::Protocol(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn refused_connect_maps_to_unreachable() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            classify_io_connect(&err),
            ConnectError::Unreachable(_)
        ));
    }

    #[test]
    fn timed_out_connect_maps_to_timeout() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(classify_io_connect(&err), ConnectError::Timeout);
    }

    #[test]
    fn unknown_io_error_maps_to_protocol() {
        let err = io::Error::other("weird");
        assert!(matches!(
            classify_io_connect(&err),
            ConnectError::Protocol(_)
        ));
    }
}
