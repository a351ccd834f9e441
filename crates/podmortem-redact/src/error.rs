//! Error types for redaction.

use thiserror::Error;

/// Errors that can occur while building a redactor.
#[derive(Debug, Error)]
pub enum RedactError {
    /// A configured log pattern is not a valid regular expression.
    #[error("invalid log redaction pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Result type alias for redaction operations.
pub type Result<T> = std::result::Result<T, RedactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_message() {
        let err = regex::Regex::new("(unclosed").unwrap_err();
        let err = RedactError::from(err);
        assert!(err.to_string().starts_with("invalid log redaction pattern"));
    }
}
