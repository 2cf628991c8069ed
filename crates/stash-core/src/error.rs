//! Error types for stash-core

use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias using stash-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stash-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Local storage quota exhausted; the write was not applied
    #[error("Local storage is full")]
    StorageFull,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored metadata failed to decode and must not be overwritten
    #[error("Corrupted local data: {0}")]
    Corrupted(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote API error surfaced to a reader
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl Error {
    /// Map a SQLite failure, splitting out quota exhaustion.
    pub(crate) fn from_write(error: rusqlite::Error) -> Self {
        match error.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DiskFull) => Self::StorageFull,
            _ => Self::Database(error),
        }
    }
}
