//! Container log collection.

use std::sync::Arc;

use crate::api::{LogOptions, PodApi};
use crate::error::Result;

/// Default tail bound when none is configured.
pub const DEFAULT_TAIL_LINES: i64 = 1000;

/// Pulls recent log lines for the current and prior container incarnations.
pub struct LogCollector {
    api: Arc<dyn PodApi>,
    tail_lines: i64,
}

impl LogCollector {
    /// Creates a log collector with the given tail bound; non-positive
    /// values fall back to [`DEFAULT_TAIL_LINES`].
    #[must_use]
    pub fn new(api: Arc<dyn PodApi>, tail_lines: i64) -> Self {
        let tail_lines = if tail_lines <= 0 {
            DEFAULT_TAIL_LINES
        } else {
            tail_lines
        };
        Self { api, tail_lines }
    }

    /// Last lines of the current incarnation.
    ///
    /// # Errors
    ///
    /// Returns an error if the log stream cannot be opened or read.
    pub async fn current(&self, namespace: &str, pod: &str, container: &str) -> Result<Vec<String>> {
        self.fetch(namespace, pod, container, false).await
    }

    /// Last lines of the terminated prior incarnation.
    ///
    /// # Errors
    ///
    /// Returns an error if the log stream cannot be opened or read.
    pub async fn previous(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
    ) -> Result<Vec<String>> {
        self.fetch(namespace, pod, container, true).await
    }

    async fn fetch(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        previous: bool,
    ) -> Result<Vec<String>> {
        let opts = LogOptions {
            container: container.to_string(),
            previous,
            tail_lines: self.tail_lines,
            timestamps: true,
        };

        let raw = self.api.container_logs(namespace, pod, &opts).await?;
        Ok(split_lines(&raw))
    }
}

/// Splits a log buffer into its non-empty lines.
fn split_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_drops_empty_lines() {
        let lines = split_lines("first\n\nsecond\n");
        assert_eq!(lines, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn split_lines_empty_buffer() {
        assert!(split_lines("").is_empty());
        assert!(split_lines("\n\n").is_empty());
    }

    #[test]
    fn split_lines_no_trailing_newline() {
        let lines = split_lines("only line");
        assert_eq!(lines, vec!["only line".to_string()]);
    }
}
