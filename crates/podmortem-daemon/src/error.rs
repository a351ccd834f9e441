//! Error types for the daemon.

use thiserror::Error;

/// Fatal daemon errors; anything here terminates startup or the run loop.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The HTTP listener could not be bound.
    #[error("failed to bind http server on {addr}: {source}")]
    Bind {
        /// The configured listen address.
        addr: String,
        /// The bind failure.
        source: std::io::Error,
    },

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        /// Path that was read.
        path: String,
        /// The I/O failure.
        source: std::io::Error,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse config: {0}")]
    ParseConfig(#[from] serde_json::Error),

    /// The configuration is structurally invalid.
    #[error("invalid config: {0}")]
    Config(String),

    /// The redaction policy could not be compiled.
    #[error(transparent)]
    Redaction(#[from] podmortem_redact::RedactError),

    /// The watcher failed fatally (cache sync).
    #[error(transparent)]
    Watch(#[from] podmortem_watch::WatchError),

    /// The report store failed fatally (directory creation).
    #[error(transparent)]
    Store(#[from] podmortem_store::StoreError),

    /// The HTTP server failed while serving.
    #[error("http server error: {0}")]
    Http(std::io::Error),
}

/// Result type alias for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;
