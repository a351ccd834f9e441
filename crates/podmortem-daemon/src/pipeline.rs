//! The crash pipeline: what happens when the watcher fires.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use podmortem_collect::Collector;
use podmortem_core::PodCrash;
use podmortem_notify::Notifier;
use podmortem_redact::Redactor;
use podmortem_store::Storage;
use podmortem_watch::CrashHandler;
use tracing::{error, info, warn};

use crate::metrics::DaemonMetrics;

/// Handles one detected crash end to end: collect under the deadline,
/// redact, count, notify every sink, persist.
///
/// Notification runs before persistence so the alert path never depends
/// on disk health; per-sink failures are recorded as report warnings and
/// metrics, never blocking the save.
pub struct CrashPipeline {
    collector: Collector,
    redactor: Option<Redactor>,
    store: Arc<dyn Storage>,
    notifiers: Vec<Arc<dyn Notifier>>,
    metrics: DaemonMetrics,
    collect_timeout: Duration,
}

impl CrashPipeline {
    /// Assembles the pipeline.
    #[must_use]
    pub fn new(
        collector: Collector,
        redactor: Option<Redactor>,
        store: Arc<dyn Storage>,
        notifiers: Vec<Arc<dyn Notifier>>,
        metrics: DaemonMetrics,
        collect_timeout: Duration,
    ) -> Self {
        Self {
            collector,
            redactor,
            store,
            notifiers,
            metrics,
            collect_timeout,
        }
    }
}

#[async_trait]
impl CrashHandler for CrashPipeline {
    async fn handle_crash(&self, crash: PodCrash) {
        let mut report = self.collector.collect(&crash, self.collect_timeout).await;

        if let Some(redactor) = &self.redactor {
            redactor.apply(&mut report);
        }

        self.metrics.inc_crashes(&crash.namespace, &crash.reason);

        for notifier in &self.notifiers {
            match notifier.notify(&report).await {
                Ok(()) => self.metrics.inc_notification(notifier.name(), true),
                Err(e) => {
                    warn!(notifier = notifier.name(), error = %e, "notification failed");
                    report.add_warning(format!("notify {}: {e}", notifier.name()));
                    self.metrics.inc_notification(notifier.name(), false);
                }
            }
        }

        match self.store.save_with_result(&report) {
            Ok(Some(result)) => {
                info!(
                    report_id = %report.id,
                    path = %result.path.display(),
                    bytes = result.bytes_written,
                    "report saved"
                );
                self.metrics.observe_report_size(result.bytes_written as f64);
            }
            Ok(None) => {
                // Backend cannot measure; fall back to the in-memory size.
                match serde_json::to_vec(&report) {
                    Ok(encoded) => self.metrics.observe_report_size(encoded.len() as f64),
                    Err(e) => warn!(error = %e, "failed to measure report size"),
                }
            }
            Err(e) => {
                // The crash stays counted in metrics; the report is not
                // retried (dedup would drop a refire anyway).
                error!(report_id = %report.id, error = %e, "failed to save report");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use podmortem_collect::{ClusterEvent, CollectError, FieldSelector, LogOptions, PodApi};
    use podmortem_core::{ForensicReport, PodSpec};
    use podmortem_notify::{NotifyError, Result as NotifyResult};
    use podmortem_redact::RedactionConfig;
    use podmortem_store::{Result as StoreResult, StoreError};

    struct FakeApi;

    #[async_trait]
    impl PodApi for FakeApi {
        async fn container_logs(
            &self,
            _namespace: &str,
            _pod: &str,
            _opts: &LogOptions,
        ) -> podmortem_collect::Result<String> {
            Ok("password=hunter2\nready\n".to_string())
        }

        async fn pod_events(
            &self,
            _namespace: &str,
            _selector: &FieldSelector,
        ) -> podmortem_collect::Result<Vec<ClusterEvent>> {
            Err(CollectError::Api("events unavailable".to_string()))
        }

        async fn pod_spec(
            &self,
            _namespace: &str,
            _pod: &str,
        ) -> podmortem_collect::Result<PodSpec> {
            Ok(PodSpec::default())
        }
    }

    struct RecordingStore {
        saved: Mutex<Vec<ForensicReport>>,
        fail: bool,
    }

    impl RecordingStore {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                saved: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl Storage for RecordingStore {
        fn save(&self, report: &ForensicReport) -> StoreResult<()> {
            if self.fail {
                return Err(StoreError::NotFound("disk on fire".to_string()));
            }
            self.saved.lock().push(report.clone());
            Ok(())
        }

        fn load(&self, id: &str) -> StoreResult<ForensicReport> {
            Err(StoreError::NotFound(id.to_string()))
        }

        fn list(&self) -> StoreResult<Vec<ForensicReport>> {
            Ok(self.saved.lock().clone())
        }
    }

    struct FlakyNotifier {
        ok: bool,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, _report: &ForensicReport) -> NotifyResult<()> {
            if self.ok {
                Ok(())
            } else {
                Err(NotifyError::Status {
                    name: "flaky",
                    status: 500,
                })
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn make_crash() -> PodCrash {
        let mut crash = PodCrash::new("prod", "api", "main");
        crash.reason = "OOMKilled".to_string();
        crash
    }

    fn make_pipeline(
        store: Arc<RecordingStore>,
        notifiers: Vec<Arc<dyn Notifier>>,
        redactor: Option<Redactor>,
    ) -> (CrashPipeline, DaemonMetrics) {
        let metrics = DaemonMetrics::new();
        let pipeline = CrashPipeline::new(
            Collector::new(Arc::new(FakeApi)),
            redactor,
            store,
            notifiers,
            metrics.clone(),
            Duration::from_secs(5),
        );
        (pipeline, metrics)
    }

    #[tokio::test]
    async fn crash_is_collected_counted_and_persisted() {
        let store = RecordingStore::new(false);
        let (pipeline, metrics) = make_pipeline(store.clone(), Vec::new(), None);

        pipeline.handle_crash(make_crash()).await;

        assert_eq!(metrics.get_crashes("prod", "OOMKilled"), 1);
        let saved = store.saved.lock();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].has_logs());
        // The failing events source left a warning, not a failure.
        assert!(saved[0].warnings.iter().any(|w| w.starts_with("events: ")));
    }

    #[tokio::test]
    async fn notifier_failure_is_recorded_before_persistence() {
        let store = RecordingStore::new(false);
        let (pipeline, metrics) = make_pipeline(
            store.clone(),
            vec![Arc::new(FlakyNotifier { ok: false })],
            None,
        );

        pipeline.handle_crash(make_crash()).await;

        assert_eq!(metrics.get_notifications("flaky", "failure"), 1);
        assert_eq!(metrics.get_notifications("flaky", "success"), 0);

        // The persisted report carries the notifier warning, which proves
        // notification ran before the save.
        let saved = store.saved.lock();
        assert!(saved[0]
            .warnings
            .iter()
            .any(|w| w.starts_with("notify flaky: ")));
    }

    #[tokio::test]
    async fn successful_notifier_is_counted() {
        let store = RecordingStore::new(false);
        let (pipeline, metrics) =
            make_pipeline(store, vec![Arc::new(FlakyNotifier { ok: true })], None);

        pipeline.handle_crash(make_crash()).await;

        assert_eq!(metrics.get_notifications("flaky", "success"), 1);
        assert_eq!(metrics.get_notifications("flaky", "failure"), 0);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_the_crash_counted() {
        let store = RecordingStore::new(true);
        let (pipeline, metrics) = make_pipeline(store, Vec::new(), None);

        pipeline.handle_crash(make_crash()).await;

        assert_eq!(metrics.get_crashes("prod", "OOMKilled"), 1);
    }

    #[tokio::test]
    async fn redaction_happens_before_any_sink() {
        let store = RecordingStore::new(false);
        let redactor = Redactor::from_config(&RedactionConfig {
            enabled: true,
            ..RedactionConfig::default()
        })
        .expect("valid config")
        .expect("enabled");

        let (pipeline, _metrics) = make_pipeline(store.clone(), Vec::new(), Some(redactor));
        pipeline.handle_crash(make_crash()).await;

        let saved = store.saved.lock();
        assert_eq!(saved[0].logs[0], "password=***");
        assert_eq!(saved[0].logs[1], "ready");
    }
}
