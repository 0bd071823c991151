//! Error types for the sync layer.

use prefsync_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// None of these reach the caller of `sync()` or `refresh()`: fetch failures
/// are retried or dropped, per-key failures are logged and recorded in the
/// pass report.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote service could not produce a snapshot.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A structured value could not be decoded into its declared type.
    #[error("failed to decode {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Invalid client or reconciler configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
