//! Error types for occupancy-store.

use std::path::PathBuf;

use occupancy_types::CalendarError;

/// Result type for occupancy-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in occupancy-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A stored timestamp or date could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A requested date range is not valid.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// CSV reading error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CalendarError> for Error {
    fn from(err: CalendarError) -> Self {
        Error::InvalidRange(err.to_string())
    }
}
