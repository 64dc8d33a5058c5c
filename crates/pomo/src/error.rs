//! Error types for the pomo client.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::io;
use thiserror::Error;

// ============================================================================
// Client Error Type
// ============================================================================

/// Errors that can occur while talking to the daemon.
///
/// Connection errors usually mean the daemon is not running; the message
/// says so, so binaries can print it as is.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to connect to the daemon.
    #[error("Failed to connect to daemon at {socket}: {reason} (is pomod running?)")]
    DaemonConnection { socket: String, reason: String },

    /// Protocol version mismatch with daemon
    #[error("Protocol version mismatch (client: {client_version}, daemon: {daemon_version})")]
    VersionMismatch {
        client_version: String,
        daemon_version: String,
    },

    /// The daemon refused the handshake.
    #[error("Daemon rejected connection: {0}")]
    Rejected(String),

    /// The daemon answered with something other than what was asked for.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The daemon reported an error for a request.
    #[error("Daemon error: {message}")]
    Daemon {
        message: String,
        code: Option<String>,
    },

    /// No answer within the request timeout.
    #[error("Timed out waiting for daemon")]
    Timeout,

    /// The daemon closed the connection.
    #[error("Daemon closed the connection")]
    Closed,

    /// I/O error passthrough.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parse error passthrough.
    #[error("Failed to parse message: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns true if the daemon is unreachable, as opposed to a failure
    /// of a single request.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::DaemonConnection { .. } | Self::Closed | Self::Timeout | Self::Io(_)
        )
    }
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Convenience Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
