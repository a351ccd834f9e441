//! Generic webhook sink.

use std::collections::HashMap;

use async_trait::async_trait;
use podmortem_core::ForensicReport;

use crate::error::Result;
use crate::retry::{build_client, post_json_with_retry};
use crate::Notifier;

/// Posts the full report JSON to a configured URL.
pub struct WebhookNotifier {
    url: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Creates a webhook sink with optional extra request headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, headers: HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            headers,
            client: build_client()?,
        })
    }

    /// The target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, report: &ForensicReport) -> Result<()> {
        let body = serde_json::to_vec(report)?;
        post_json_with_retry(&self.client, "webhook", &self.url, &self.headers, body).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
