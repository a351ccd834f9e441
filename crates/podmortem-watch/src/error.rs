//! Error types for the watcher.

use thiserror::Error;

/// Errors that can occur while watching pods.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The informer cache failed to synchronize during startup.
    #[error("informer cache failed to sync: {0}")]
    SyncFailed(String),

    /// The underlying watch source failed fatally.
    #[error("informer source error: {0}")]
    Source(String),
}

/// Result type alias for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;
