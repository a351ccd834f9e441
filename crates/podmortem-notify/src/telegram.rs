//! Telegram bot API sink.

use std::time::Duration;

use async_trait::async_trait;
use podmortem_core::ForensicReport;
use serde::{Deserialize, Serialize};

use crate::error::{NotifyError, Result};
use crate::retry::{
    backoff_delay, build_client, drain_body, retry_after_from_headers, MAX_ATTEMPTS,
};
use crate::Notifier;

const TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";

/// Posts a plain-text crash summary via the Telegram bot API.
///
/// Telegram wraps every answer in a JSON envelope; a 2xx with `ok: false`
/// is a rejection, and a 429 carries its retry delay in
/// `parameters.retry_after` as well as the `Retry-After` header. Both are
/// honored in place of the exponential backoff.
pub struct TelegramNotifier {
    base_url: String,
    token: String,
    chat_id: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest {
    chat_id: String,
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error_code: i64,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: TelegramParameters,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramParameters {
    #[serde(default)]
    retry_after: u64,
}

impl TelegramNotifier {
    /// Creates a Telegram sink; `base_url` overrides the public API host
    /// (used by tests), `None` or blank means the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: Option<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Result<Self> {
        let base_url = match base_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ => TELEGRAM_API_BASE_URL.to_string(),
        };

        Ok(Self {
            base_url,
            token: token.into(),
            chat_id: chat_id.into(),
            client: build_client()?,
        })
    }

    fn build_text(report: &ForensicReport) -> String {
        let crash = &report.crash;
        format!(
            "Pod crash detected: {}\nNamespace: {}\nPod: {}\nContainer: {}\nReason: {}\nExit code: {}\nRestart count: {}\nReport ID: {}\nCollected: {}",
            report.summary(),
            crash.namespace,
            crash.pod_name,
            crash.container_name,
            crash.reason,
            crash.exit_code,
            crash.restart_count,
            report.id,
            report.collected_at.format("%Y-%m-%d %H:%M:%S"),
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, report: &ForensicReport) -> Result<()> {
        let body = serde_json::to_vec(&SendMessageRequest {
            chat_id: self.chat_id.clone(),
            text: Self::build_text(report),
        })?;
        let endpoint = format!("{}/bot{}/sendMessage", self.base_url, self.token);

        let mut attempt = 0;
        loop {
            let (error, retry_after) = match self.attempt(&endpoint, &body).await {
                Ok(()) => return Ok(()),
                Err(attempt_err) => {
                    if attempt_err.fatal {
                        return Err(attempt_err.error);
                    }
                    (attempt_err.error, attempt_err.retry_after)
                }
            };

            attempt += 1;
            if attempt >= MAX_ATTEMPTS {
                return Err(error);
            }
            tokio::time::sleep(retry_after.unwrap_or_else(|| backoff_delay(attempt - 1))).await;
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

struct AttemptError {
    error: NotifyError,
    fatal: bool,
    retry_after: Option<Duration>,
}

impl TelegramNotifier {
    async fn attempt(&self, endpoint: &str, body: &[u8]) -> std::result::Result<(), AttemptError> {
        let response = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| AttemptError {
                error: NotifyError::Request(e),
                fatal: false,
                retry_after: None,
            })?;

        let status = response.status();
        let header_retry_after = retry_after_from_headers(&response);

        let response_body = drain_body(response).await.map_err(|e| AttemptError {
            error: e,
            fatal: false,
            retry_after: None,
        })?;

        let envelope: Option<TelegramResponse> = if response_body.is_empty() {
            None
        } else {
            serde_json::from_slice(&response_body).ok()
        };

        if status.is_success() {
            if let Some(envelope) = envelope {
                if !envelope.ok {
                    return Err(AttemptError {
                        error: NotifyError::TelegramRejected {
                            description: envelope.description.trim().to_string(),
                            code: envelope.error_code,
                        },
                        fatal: true,
                        retry_after: None,
                    });
                }
            }
            return Ok(());
        }

        let (description, body_retry_after) = match &envelope {
            Some(envelope) => (
                if envelope.description.trim().is_empty() {
                    "unknown error".to_string()
                } else {
                    envelope.description.trim().to_string()
                },
                (envelope.parameters.retry_after > 0)
                    .then(|| Duration::from_secs(envelope.parameters.retry_after)),
            ),
            None => {
                let text = String::from_utf8_lossy(&response_body).trim().to_string();
                (
                    if text.is_empty() {
                        "unknown error".to_string()
                    } else {
                        text
                    },
                    None,
                )
            }
        };

        let retryable =
            status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS;

        Err(AttemptError {
            error: NotifyError::TelegramStatus {
                status: status.as_u16(),
                description,
            },
            fatal: !retryable,
            retry_after: if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                body_retry_after.or(header_retry_after)
            } else {
                None
            },
        })
    }
}
