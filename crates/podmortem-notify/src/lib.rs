//! # podmortem-notify
//!
//! Best-effort crash notification sinks.
//!
//! This crate provides:
//!
//! - [`Notifier`] — The delivery contract
//! - [`WebhookNotifier`] — Posts the full report JSON to a generic webhook
//! - [`SlackNotifier`] — Posts a formatted attachment message to a Slack
//!   incoming webhook
//! - [`TelegramNotifier`] — Posts a `sendMessage` call to the Telegram bot
//!   API, honoring its rate-limit envelope
//!
//! Delivery is best-effort with bounded retry: up to three attempts with
//! exponential backoff (200 ms doubling, capped at 2 s). Transport errors,
//! 5xx and 429 retry; any other 4xx fails on the first attempt. A
//! `Retry-After` hint, when present, replaces the backoff delay.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod retry;
pub mod slack;
pub mod telegram;
pub mod webhook;

use async_trait::async_trait;
use podmortem_core::ForensicReport;

pub use error::{NotifyError, Result};
pub use slack::SlackNotifier;
pub use telegram::TelegramNotifier;
pub use webhook::WebhookNotifier;

/// A notification sink for forensic reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one report.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery definitively failed after the retry
    /// budget was spent (or immediately on a non-retryable rejection).
    async fn notify(&self, report: &ForensicReport) -> Result<()>;

    /// Stable name of this sink, used in metrics labels and warnings.
    fn name(&self) -> &str;
}
