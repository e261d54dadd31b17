//! Sync error types.

use icsync_feeds::FeedError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while syncing.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The destination rejected or failed an operation.
    #[error("Destination error: {0}")]
    Destination(#[from] DestinationError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Fetch or fetch-state error.
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
}

impl SyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Errors reported by a [`Destination`](crate::Destination).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    /// The record was rejected; each entry is one validation failure.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),

    /// No record with this id exists.
    #[error("Record not found: {id}")]
    NotFound { id: String },

    /// The backing store failed.
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DestinationError {
    /// Creates a validation error from a single message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(vec![message.into()])
    }

    /// Creates a not-found error.
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound { id: id.to_string() }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_join_with_commas() {
        let err = DestinationError::Validation(vec![
            "Title is too short".to_string(),
            "Body is empty".to_string(),
        ]);
        assert_eq!(err.to_string(), "Title is too short, Body is empty");
    }

    #[test]
    fn sync_error_wraps_destination() {
        let err: SyncError = DestinationError::not_found(42).into();
        assert_eq!(err.to_string(), "Destination error: Record not found: 42");
    }
}
