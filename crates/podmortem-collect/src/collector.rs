//! Report composition from parallel evidence sources.

use std::sync::Arc;
use std::time::Duration;

use podmortem_core::{ForensicReport, PodCrash};
use tracing::debug;

use crate::api::PodApi;
use crate::env::EnvCollector;
use crate::error::{CollectError, Result};
use crate::events::EventCollector;
use crate::logs::{LogCollector, DEFAULT_TAIL_LINES};

/// Composes forensic reports from the evidence sources.
///
/// A collector call never fails: each source runs concurrently under its
/// own deadline, and a source that errors or times out contributes a
/// warning to the report instead of sinking it.
pub struct Collector {
    logs: LogCollector,
    events: EventCollector,
    env: EnvCollector,
}

impl Collector {
    /// Creates a collector with the default log tail bound.
    #[must_use]
    pub fn new(api: Arc<dyn PodApi>) -> Self {
        Self::with_tail_lines(api, DEFAULT_TAIL_LINES)
    }

    /// Creates a collector with an explicit log tail bound.
    #[must_use]
    pub fn with_tail_lines(api: Arc<dyn PodApi>, tail_lines: i64) -> Self {
        Self {
            logs: LogCollector::new(api.clone(), tail_lines),
            events: EventCollector::new(api.clone()),
            env: EnvCollector::new(api),
        }
    }

    /// Gathers all evidence for a crash into a fresh report.
    ///
    /// Each of the four sources (current logs, previous logs, events, env)
    /// is bounded by `timeout` independently.
    pub async fn collect(&self, crash: &PodCrash, timeout: Duration) -> ForensicReport {
        let mut report = ForensicReport::new(crash.clone());

        let namespace = crash.namespace.as_str();
        let pod = crash.pod_name.as_str();
        let container = crash.container_name.as_str();

        let (logs, previous, events, env) = tokio::join!(
            bounded(timeout, self.logs.current(namespace, pod, container)),
            bounded(timeout, self.logs.previous(namespace, pod, container)),
            bounded(timeout, self.events.for_pod(namespace, pod)),
            bounded(timeout, self.env.for_container(namespace, pod, container)),
        );

        match logs {
            Ok(lines) => report.set_logs(lines),
            Err(e) => report.add_warning(format!("logs: {e}")),
        }

        match previous {
            Ok(lines) => report.set_previous_logs(lines),
            Err(e) => report.add_warning(format!("previous logs: {e}")),
        }

        match events {
            Ok(events) => {
                for event in events {
                    report.add_event(event);
                }
            }
            Err(e) => report.add_warning(format!("events: {e}")),
        }

        match env {
            Ok(env_vars) => {
                for (key, value) in env_vars {
                    report.set_env_var(key, value);
                }
            }
            Err(e) => report.add_warning(format!("env: {e}")),
        }

        debug!(
            report_id = %report.id,
            pod = %crash.full_name(),
            warnings = report.warnings.len(),
            "forensics collected"
        );

        report
    }
}

/// Applies the per-source deadline, mapping an elapsed timer to
/// [`CollectError::Timeout`].
async fn bounded<T>(
    timeout: Duration,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CollectError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use podmortem_core::{
        ContainerSpec, EnvSource, EnvValue, EnvVarSpec, PodSpec, FROM_SOURCE,
    };

    use crate::api::{ClusterEvent, FieldSelector, LogOptions};

    /// Configurable in-memory cluster surface.
    #[derive(Default)]
    struct FakeApi {
        logs: Option<String>,
        previous_logs: Option<String>,
        events: Option<Vec<ClusterEvent>>,
        spec: Option<PodSpec>,
        log_delay: Option<Duration>,
    }

    #[async_trait]
    impl PodApi for FakeApi {
        async fn container_logs(
            &self,
            _namespace: &str,
            _pod: &str,
            opts: &LogOptions,
        ) -> Result<String> {
            if let Some(delay) = self.log_delay {
                tokio::time::sleep(delay).await;
            }
            let source = if opts.previous {
                &self.previous_logs
            } else {
                &self.logs
            };
            source
                .clone()
                .ok_or_else(|| CollectError::LogStream("stream unavailable".to_string()))
        }

        async fn pod_events(
            &self,
            _namespace: &str,
            selector: &FieldSelector,
        ) -> Result<Vec<ClusterEvent>> {
            assert!(selector.as_str().contains("involvedObject.kind=Pod"));
            self.events
                .clone()
                .ok_or_else(|| CollectError::Api("event list failed".to_string()))
        }

        async fn pod_spec(&self, _namespace: &str, pod: &str) -> Result<PodSpec> {
            self.spec
                .clone()
                .ok_or_else(|| CollectError::PodNotFound(pod.to_string()))
        }
    }

    fn make_crash() -> PodCrash {
        let mut crash = PodCrash::new("prod", "api", "main");
        crash.reason = "OOMKilled".to_string();
        crash.exit_code = 137;
        crash
    }

    fn full_fake() -> FakeApi {
        FakeApi {
            logs: Some("line 1\nline 2\n".to_string()),
            previous_logs: Some("old line\n".to_string()),
            events: Some(vec![ClusterEvent {
                event_type: "Warning".to_string(),
                reason: "BackOff".to_string(),
                message: "restarting failed container".to_string(),
                count: 3,
                first_timestamp: Some(Utc::now()),
                last_timestamp: Some(Utc::now()),
                source_component: "kubelet".to_string(),
            }]),
            spec: Some(PodSpec {
                containers: vec![ContainerSpec {
                    name: "main".to_string(),
                    env: vec![
                        EnvVarSpec {
                            name: "PORT".to_string(),
                            value: EnvValue::Literal("8080".to_string()),
                        },
                        EnvVarSpec {
                            name: "TOKEN".to_string(),
                            value: EnvValue::FromSource(EnvSource::SecretKey),
                        },
                    ],
                }],
            }),
            log_delay: None,
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn all_sources_succeed() {
        let collector = Collector::new(Arc::new(full_fake()));
        let report = collector.collect(&make_crash(), TIMEOUT).await;

        assert_eq!(report.logs, vec!["line 1", "line 2"]);
        assert_eq!(report.previous_log, vec!["old line"]);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.env_vars.get("PORT"), Some(&"8080".to_string()));
        assert_eq!(report.env_vars.get("TOKEN"), Some(&FROM_SOURCE.to_string()));
        assert!(report.warnings.is_empty());
        assert_eq!(report.crash.exit_code, 137);
        assert_eq!(report.id.len(), 16);
    }

    #[tokio::test]
    async fn failed_source_becomes_warning() {
        let mut fake = full_fake();
        fake.events = None;

        let collector = Collector::new(Arc::new(fake));
        let report = collector.collect(&make_crash(), TIMEOUT).await;

        assert!(report.has_logs());
        assert!(report.events.is_empty());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("events: "));
    }

    #[tokio::test]
    async fn every_source_can_fail_independently() {
        let collector = Collector::new(Arc::new(FakeApi::default()));
        let report = collector.collect(&make_crash(), TIMEOUT).await;

        assert_eq!(report.warnings.len(), 4);
        assert!(report.warnings.iter().any(|w| w.starts_with("logs: ")));
        assert!(report
            .warnings
            .iter()
            .any(|w| w.starts_with("previous logs: ")));
        assert!(report.warnings.iter().any(|w| w.starts_with("events: ")));
        assert!(report.warnings.iter().any(|w| w.starts_with("env: ")));
        assert!(!report.has_logs());
        assert!(!report.has_events());
    }

    #[tokio::test]
    async fn slow_source_times_out_into_warning() {
        let mut fake = full_fake();
        fake.log_delay = Some(Duration::from_millis(200));

        let collector = Collector::new(Arc::new(fake));
        let report = collector
            .collect(&make_crash(), Duration::from_millis(20))
            .await;

        assert!(report
            .warnings
            .iter()
            .any(|w| w == "logs: collection timed out"));
        assert!(report
            .warnings
            .iter()
            .any(|w| w == "previous logs: collection timed out"));
        // Events and env are fast and still land.
        assert!(report.has_events());
        assert!(!report.env_vars.is_empty());
    }

    #[tokio::test]
    async fn empty_log_stream_yields_empty_lines() {
        let mut fake = full_fake();
        fake.logs = Some(String::new());

        let collector = Collector::new(Arc::new(fake));
        let report = collector.collect(&make_crash(), TIMEOUT).await;

        assert!(report.logs.is_empty());
        assert!(report.warnings.is_empty());
    }
}
