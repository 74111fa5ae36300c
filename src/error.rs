//! Error types for nntp-importer
//!
//! Errors fall into a small taxonomy that decides how a job reacts:
//! - Connect-phase failures (`Connect`, `ConnectTimeout`) are transient and retried forever
//! - Configuration and status-file problems are fatal to the owning job
//! - Transport failures mid-cycle (`ConnectionClosed`, `Io`) and malformed success
//!   replies (`InvalidResponse`) end the job and trigger cancellation of its sibling
//!
//! Per-item protocol rejections (an unexpected code for `GROUP`, `ARTICLE` or `IHAVE`)
//! are not errors at all; the jobs handle them locally as skips.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for nntp-importer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nntp-importer
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "import_dir")
        key: Option<String>,
    },

    /// TCP connection could not be established
    #[error("unable to connect to {addr}: {source}")]
    Connect {
        /// `host:port` that was dialed
        addr: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// TCP connection was not established within the connect timeout
    #[error("timed out after {timeout:?} connecting to {addr}")]
    ConnectTimeout {
        /// `host:port` that was dialed
        addr: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Server closed the connection while a reply was still expected
    #[error("connection closed by server while {context}")]
    ConnectionClosed {
        /// What the session was waiting for (e.g., "reading ARTICLE body")
        context: String,
    },

    /// A success reply that could not be parsed
    #[error("invalid response to {command}: {line:?}")]
    InvalidResponse {
        /// The command the reply answered
        command: String,
        /// The raw reply line
        line: String,
    },

    /// The newsgroup status file is missing, unreadable or malformed
    #[error("status file {}: {reason}", path.display())]
    StatusFile {
        /// Path of the status file
        path: PathBuf,
        /// 1-based line number, when the problem is tied to a line
        line: Option<usize>,
        /// What went wrong
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A job task panicked or was aborted
    #[error("job task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Build a [`Error::Config`] for the given key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Build a [`Error::ConnectionClosed`] for the given context
    pub fn closed(context: impl Into<String>) -> Self {
        Error::ConnectionClosed {
            context: context.into(),
        }
    }
}
