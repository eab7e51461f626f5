//! Error types for the gymlog_core library.

use crate::EntryKey;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for log store operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Core error type for gymlog_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Log store operation failed
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Failure of a log store operation.
///
/// Transport and decoding failures are converted into these kinds at the
/// store boundary; nothing from the HTTP or JSON layers escapes past it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The store could not be reached
    #[error("network error: {0}")]
    Network(String),

    /// The store answered but refused or garbled the request
    #[error("server rejected request{}: {message}", status_suffix(.status))]
    ServerRejected {
        status: Option<u16>,
        message: String,
    },

    /// The identity does not resolve to a record in the store
    #[error("no log entry with {0}")]
    NotFound(EntryKey),

    /// The backend does not implement this operation
    #[error("{backend} store does not support {operation}")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// The local log file could not be read or written
    #[error("storage error: {0}")]
    Storage(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl SyncError {
    /// Only transport failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_))
    }

    pub(crate) fn rejected(status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::ServerRejected {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::rejected(
                err.status().map(|s| s.as_u16()),
                format!("malformed response: {}", err),
            )
        } else if let Some(status) = err.status() {
            SyncError::rejected(Some(status.as_u16()), err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<io::Error> for SyncError {
    fn from(err: io::Error) -> Self {
        SyncError::Storage(err.to_string())
    }
}
