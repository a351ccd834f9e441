//! Shared retry plumbing for HTTP sinks.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::error::{NotifyError, Result};

/// Retry budget per delivery.
pub const MAX_ATTEMPTS: u32 = 3;

/// Cap on how much of a response body is read while draining.
pub const MAX_DRAIN_BYTES: usize = 1 << 20;

/// Client timeout for every sink.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

const BACKOFF_BASE: Duration = Duration::from_millis(200);
const BACKOFF_CAP: Duration = Duration::from_secs(2);

/// Builds the shared HTTP client.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(CLIENT_TIMEOUT)
        .build()
        .map_err(NotifyError::Client)
}

/// Exponential backoff: 200 ms doubled per attempt, capped at 2 s.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    let mut delay = BACKOFF_BASE;
    for _ in 0..attempt {
        delay *= 2;
        if delay >= BACKOFF_CAP {
            return BACKOFF_CAP;
        }
    }
    delay
}

/// Parses a positive integer `Retry-After` header into a duration.
#[must_use]
pub fn retry_after_from_headers(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|seconds| *seconds > 0)
        .map(Duration::from_secs)
}

/// Reads and discards up to [`MAX_DRAIN_BYTES`] of the response body so
/// the connection can be reused, returning what was read.
///
/// # Errors
///
/// Returns an error if the body stream fails mid-read.
pub async fn drain_body(mut response: reqwest::Response) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(NotifyError::Body)? {
        if body.len() + chunk.len() >= MAX_DRAIN_BYTES {
            let take = MAX_DRAIN_BYTES - body.len();
            body.extend_from_slice(&chunk[..take]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Posts a JSON body with the shared retry policy: up to
/// [`MAX_ATTEMPTS`] attempts, retrying on transport errors, 5xx and 429
/// (honoring `Retry-After`), failing immediately on any other 4xx.
///
/// # Errors
///
/// Returns the final error once the retry budget is spent, or the first
/// non-retryable rejection.
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    name: &'static str,
    url: &str,
    headers: &HashMap<String, String>,
    body: Vec<u8>,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        let (error, retry_after) = match attempt_post(client, name, url, headers, &body).await {
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

/// One failed delivery attempt.
pub struct AttemptError {
    /// What went wrong.
    pub error: NotifyError,
    /// Non-retryable: give up immediately.
    pub fatal: bool,
    /// Server-provided delay overriding backoff.
    pub retry_after: Option<Duration>,
}

async fn attempt_post(
    client: &reqwest::Client,
    name: &'static str,
    url: &str,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> std::result::Result<(), AttemptError> {
    let mut request = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body.to_vec());
    for (key, value) in headers {
        request = request.header(key.as_str(), value.as_str());
    }

    let response = request.send().await.map_err(|e| AttemptError {
        error: NotifyError::Request(e),
        fatal: false,
        retry_after: None,
    })?;

    let status = response.status();
    let retry_after = retry_after_from_headers(&response);

    drain_body(response).await.map_err(|e| AttemptError {
        error: e,
        fatal: false,
        retry_after: None,
    })?;

    if status.is_success() {
        return Ok(());
    }

    let error = NotifyError::Status {
        name,
        status: status.as_u16(),
    };
    let retryable = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;

    Err(AttemptError {
        error,
        fatal: !retryable,
        retry_after: if status == StatusCode::TOO_MANY_REQUESTS {
            retry_after
        } else {
            None
        },
    })
}
