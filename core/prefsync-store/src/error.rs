//! Error types for the store layer.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Value kind does not match the key's declared type.
    #[error("type mismatch for {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },

    /// Invalid persisted data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl From<prefsync_types::Error> for StoreError {
    fn from(err: prefsync_types::Error) -> Self {
        match err {
            prefsync_types::Error::Serialization(e) => StoreError::Serialization(e),
            other => StoreError::InvalidData(other.to_string()),
        }
    }
}
