//! Error types for the logbridge crates.

use std::net::SocketAddr;
use std::process::ExitStatus;

use thiserror::Error;

/// Result type alias using the bridge [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for bridge operations.
///
/// Only [`Error::Bind`] and [`Error::Config`] abort startup; every other
/// variant is contained within the session (or pump) that produced it and
/// never affects sibling sessions or the listener.
#[derive(Debug, Error)]
pub enum Error {
    /// The listener could not bind its address. Fatal at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// A backend process could not be spawned. Rejects that one connection;
    /// the listener keeps serving.
    #[error("failed to spawn backend `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// A pump hit a read or write error. Drains the owning session.
    #[error("{label} stream failed: {source}")]
    Stream {
        label: &'static str,
        source: std::io::Error,
    },

    /// The backend exited with a non-success status. Logged for diagnostics,
    /// never re-interpreted.
    #[error("backend exited abnormally: {status}")]
    BackendExit { status: ExitStatus },

    /// Sessions still open when the shutdown grace period elapsed.
    #[error("{forced} session(s) force-closed after shutdown grace period")]
    ShutdownTimeout { forced: usize },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
