//! Slack incoming-webhook sink.

use std::collections::HashMap;

use async_trait::async_trait;
use podmortem_core::ForensicReport;
use serde::Serialize;

use crate::error::Result;
use crate::retry::{build_client, post_json_with_retry};
use crate::Notifier;

/// Posts a formatted crash summary to a Slack incoming webhook.
pub struct SlackNotifier {
    webhook_url: String,
    channel: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    #[serde(skip_serializing_if = "String::is_empty")]
    channel: String,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    color: String,
    fields: Vec<SlackField>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

impl SlackNotifier {
    /// Creates a Slack sink; an empty channel uses the webhook's default.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(webhook_url: impl Into<String>, channel: impl Into<String>) -> Result<Self> {
        Ok(Self {
            webhook_url: webhook_url.into(),
            channel: channel.into(),
            client: build_client()?,
        })
    }

    fn build_message(&self, report: &ForensicReport) -> SlackMessage {
        let crash = &report.crash;
        let field = |title: &str, value: String, short: bool| SlackField {
            title: title.to_string(),
            value,
            short,
        };

        SlackMessage {
            channel: self.channel.clone(),
            text: format!("\u{1f6a8} *Pod Crash Detected: {}*", report.summary()),
            attachments: vec![SlackAttachment {
                color: color_for_reason(&crash.reason).to_string(),
                fields: vec![
                    field("Namespace", crash.namespace.clone(), true),
                    field("Pod", crash.pod_name.clone(), true),
                    field("Container", crash.container_name.clone(), true),
                    field("Reason", crash.reason.clone(), true),
                    field("Exit Code", crash.exit_code.to_string(), true),
                    field("Restart Count", crash.restart_count.to_string(), true),
                    field("Report ID", report.id.clone(), false),
                    field(
                        "Collected",
                        report.collected_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        true,
                    ),
                ],
            }],
        }
    }
}

fn color_for_reason(reason: &str) -> &'static str {
    match reason {
        "OOMKilled" => "danger",
        "CrashLoopBackOff" => "warning",
        _ => "#ff9500",
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, report: &ForensicReport) -> Result<()> {
        let body = serde_json::to_vec(&self.build_message(report))?;
        post_json_with_retry(
            &self.client,
            "slack",
            &self.webhook_url,
            &HashMap::new(),
            body,
        )
        .await
    }

    fn name(&self) -> &str {
        "slack"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podmortem_core::PodCrash;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_report() -> ForensicReport {
        let mut crash = PodCrash::new("prod", "api", "main");
        crash.reason = "OOMKilled".to_string();
        crash.exit_code = 137;
        crash.restart_count = 3;
        ForensicReport::new(crash)
    }

    #[test]
    fn colors_follow_the_reason() {
        assert_eq!(color_for_reason("OOMKilled"), "danger");
        assert_eq!(color_for_reason("CrashLoopBackOff"), "warning");
        assert_eq!(color_for_reason("Error"), "#ff9500");
    }

    #[test]
    fn message_carries_crash_fields() {
        let notifier = SlackNotifier::new("http://example.invalid", "#alerts").expect("client");
        let report = make_report();
        let message = notifier.build_message(&report);

        assert_eq!(message.channel, "#alerts");
        assert!(message.text.contains("prod/api - OOMKilled"));
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].color, "danger");

        let titles: Vec<&str> = message.attachments[0]
            .fields
            .iter()
            .map(|f| f.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec![
                "Namespace",
                "Pod",
                "Container",
                "Reason",
                "Exit Code",
                "Restart Count",
                "Report ID",
                "Collected"
            ]
        );
    }

    #[test]
    fn empty_channel_is_omitted_from_payload() {
        let notifier = SlackNotifier::new("http://example.invalid", "").expect("client");
        let json =
            serde_json::to_string(&notifier.build_message(&make_report())).expect("serialize");
        assert!(!json.contains("\"channel\""));
    }

    #[tokio::test]
    async fn delivers_formatted_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/services/hook"))
            .and(body_string_contains("Pod Crash Detected"))
            .and(body_string_contains("OOMKilled"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            SlackNotifier::new(format!("{}/services/hook", server.uri()), "").expect("client");
        notifier.notify(&make_report()).await.expect("delivered");
    }

    #[tokio::test]
    async fn retries_5xx_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(server.uri(), "").expect("client");
        notifier.notify(&make_report()).await.expect("delivered");
    }
}
