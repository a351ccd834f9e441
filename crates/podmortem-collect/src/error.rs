//! Error types for evidence collection.

use thiserror::Error;

/// Errors that can occur while pulling evidence from the cluster.
///
/// These are transient by design: the [`crate::Collector`] converts each
/// one into a report warning rather than failing the report.
#[derive(Debug, Clone, Error)]
pub enum CollectError {
    /// The cluster API rejected or failed the request.
    #[error("cluster api error: {0}")]
    Api(String),

    /// The log stream could not be opened or read.
    #[error("failed to read log stream: {0}")]
    LogStream(String),

    /// The requested pod was not found.
    #[error("pod not found: {0}")]
    PodNotFound(String),

    /// The source did not answer within the collection deadline.
    #[error("collection timed out")]
    Timeout,
}

/// Result type alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectError>;
