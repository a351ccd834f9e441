//! Error types for notification delivery.

use thiserror::Error;

/// Errors that can occur while delivering a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The HTTP client could not be constructed.
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),

    /// The request could not be sent (connect, DNS, timeout).
    #[error("failed to send request: {0}")]
    Request(reqwest::Error),

    /// The response body could not be read.
    #[error("failed to read response: {0}")]
    Body(reqwest::Error),

    /// The payload could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink answered with a non-success status.
    #[error("{name} returned status {status}")]
    Status {
        /// Sink name.
        name: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// Telegram answered with a non-success status and a description.
    #[error("telegram returned status {status}: {description}")]
    TelegramStatus {
        /// HTTP status code.
        status: u16,
        /// Description from the response envelope, or `unknown error`.
        description: String,
    },

    /// Telegram answered 2xx but rejected the request in its envelope.
    #[error("telegram rejected request: {description} (code={code})")]
    TelegramRejected {
        /// Description from the response envelope.
        description: String,
        /// Telegram error code.
        code: i64,
    },
}

/// Result type alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
