//! Error types for report persistence.

use thiserror::Error;

/// Errors that can occur in a report store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No report with the given id exists.
    #[error("report not found: {0}")]
    NotFound(String),

    /// The store directory could not be created.
    #[error("failed to create reports directory: {0}")]
    CreateDir(std::io::Error),

    /// Serialization or deserialization of a report failed.
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing a report.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Both halves of a composed store failed.
    #[error("both stores failed: primary: {primary}, secondary: {secondary}")]
    BothStoresFailed {
        /// The primary store's failure.
        primary: String,
        /// The secondary store's failure.
        secondary: String,
    },

    /// The primary of a composed store failed while the secondary
    /// succeeded.
    #[error("primary store failed (secondary succeeded): {0}")]
    PrimaryFailed(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
