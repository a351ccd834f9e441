//! Task orchestration: HTTP server, watcher, prune loop, shutdown.

use std::sync::Arc;
use std::time::Duration;

use podmortem_collect::{Collector, PodApi};
use podmortem_notify::Notifier;
use podmortem_redact::Redactor;
use podmortem_store::Storage;
use podmortem_watch::{InformerSource, Watcher, WatcherConfig};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::api::{build_router, ApiState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};
use crate::metrics::DaemonMetrics;
use crate::pipeline::CrashPipeline;

/// Grace window for in-flight HTTP requests on shutdown.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

/// Everything a daemon needs: configuration plus the injected
/// collaborators (store, sinks, and the cluster surface).
pub struct DaemonOptions {
    /// Daemon configuration.
    pub config: DaemonConfig,
    /// Report backend.
    pub store: Arc<dyn Storage>,
    /// Notification sinks, fanned out per crash.
    pub notifiers: Vec<Arc<dyn Notifier>>,
    /// Read surface for evidence collection.
    pub pod_api: Arc<dyn PodApi>,
    /// Pod watch feeding the detector.
    pub informer: Arc<dyn InformerSource>,
}

/// The assembled daemon.
///
/// Owns the watcher, pipeline, store handle and metrics; the watcher holds
/// only the crash-handler callback, and evidence sources hold only the
/// cluster surface, so ownership stays acyclic.
pub struct Daemon {
    config: DaemonConfig,
    store: Arc<dyn Storage>,
    metrics: DaemonMetrics,
    watcher: Arc<Watcher>,
    informer: Arc<dyn InformerSource>,
}

impl Daemon {
    /// Assembles the daemon from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the redaction policy fails to compile.
    pub fn new(options: DaemonOptions) -> Result<Self> {
        let DaemonOptions {
            config,
            store,
            notifiers,
            pod_api,
            informer,
        } = options;

        let metrics = DaemonMetrics::new();
        let redactor = Redactor::from_config(&config.reports.redaction)?;

        let pipeline = Arc::new(CrashPipeline::new(
            Collector::new(pod_api),
            redactor,
            store.clone(),
            notifiers,
            metrics.clone(),
            config.collect_timeout(),
        ));

        let mut watcher_config = WatcherConfig::default().with_reasons(&config.watch.reasons);
        if !config.namespace.is_empty() {
            watcher_config = watcher_config.with_namespace(config.namespace.clone());
        }
        let watcher = Arc::new(Watcher::new(pipeline, watcher_config));

        Ok(Self {
            config,
            store,
            metrics,
            watcher,
            informer,
        })
    }

    /// The daemon's metrics registry.
    #[must_use]
    pub fn metrics(&self) -> &DaemonMetrics {
        &self.metrics
    }

    /// Runs until shutdown: HTTP server, watcher and prune loop in
    /// parallel.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind, the informer cache
    /// fails to sync, or the HTTP server fails while serving.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener =
            TcpListener::bind(&self.config.http_addr)
                .await
                .map_err(|e| DaemonError::Bind {
                    addr: self.config.http_addr.clone(),
                    source: e,
                })?;
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "http server listening");
        }

        let router = build_router(ApiState {
            store: self.store.clone(),
            metrics: self.metrics.clone(),
            token: self.config.api.token.clone(),
            allow_full: self.config.api.allow_full,
            reports_enabled: self.config.api.reports_enabled,
        });

        let (err_tx, mut err_rx) = mpsc::channel::<DaemonError>(1);

        let mut http_shutdown = shutdown.clone();
        let http_task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.changed().await;
                })
                .await
        });

        {
            let watcher = self.watcher.clone();
            let informer = self.informer.clone();
            let watcher_shutdown = shutdown.clone();
            let err_tx = err_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = watcher.run(informer.as_ref(), watcher_shutdown).await {
                    let _ = err_tx.send(DaemonError::Watch(e)).await;
                }
            });
        }

        tokio::spawn(prune_loop(
            self.store.clone(),
            self.config.retention(),
            self.config.prune_interval(),
            shutdown.clone(),
        ));

        let mut shutdown_wait = shutdown;
        tokio::select! {
            Some(err) = err_rx.recv() => {
                http_task.abort();
                return Err(err);
            }
            _ = shutdown_wait.changed() => {}
        }

        info!("shutting down, draining http connections");
        match tokio::time::timeout(SHUTDOWN_DRAIN, http_task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(DaemonError::Http(e)),
            Ok(Err(_)) => Ok(()),
            Err(_) => {
                warn!("http server did not drain within the shutdown window");
                Ok(())
            }
        }
    }
}

/// Periodic retention sweep: one sweep immediately, then every
/// `interval`. Exits when retention is disabled or the store has no
/// retention capability.
async fn prune_loop(
    store: Arc<dyn Storage>,
    retention: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    if retention.is_zero() {
        return;
    }

    if !run_prune(&store, retention) {
        return;
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // the first tick completes immediately

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {
                if !run_prune(&store, retention) {
                    return;
                }
            }
        }
    }
}

/// One sweep; false when the store has no retention capability.
fn run_prune(store: &Arc<dyn Storage>, retention: Duration) -> bool {
    match store.prune(retention) {
        Ok(Some(result)) => {
            info!(
                deleted = result.deleted,
                kept = result.kept,
                failed = result.failed,
                "pruned reports"
            );
            if let Some(e) = result.first_error {
                warn!(error = %e, "prune completed with errors");
            }
            true
        }
        Ok(None) => false,
        Err(e) => {
            warn!(error = %e, "failed to prune reports");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use podmortem_collect::{ClusterEvent, FieldSelector, LogOptions};
    use podmortem_core::{
        ContainerState, ContainerStatus, ForensicReport, PodSnapshot, PodSpec, TerminatedState,
    };
    use podmortem_store::{Compression, FileStore};
    use podmortem_watch::PodUpdate;
    use tokio::sync::mpsc as update_mpsc;

    struct FakeApi;

    #[async_trait]
    impl PodApi for FakeApi {
        async fn container_logs(
            &self,
            _namespace: &str,
            _pod: &str,
            _opts: &LogOptions,
        ) -> podmortem_collect::Result<String> {
            Ok("boom\n".to_string())
        }

        async fn pod_events(
            &self,
            _namespace: &str,
            _selector: &FieldSelector,
        ) -> podmortem_collect::Result<Vec<ClusterEvent>> {
            Ok(Vec::new())
        }

        async fn pod_spec(
            &self,
            _namespace: &str,
            _pod: &str,
        ) -> podmortem_collect::Result<PodSpec> {
            Ok(PodSpec::default())
        }
    }

    struct ChannelSource {
        rx: Mutex<Option<update_mpsc::Receiver<PodUpdate>>>,
    }

    impl ChannelSource {
        fn new() -> (Arc<Self>, update_mpsc::Sender<PodUpdate>) {
            let (tx, rx) = update_mpsc::channel(16);
            (
                Arc::new(Self {
                    rx: Mutex::new(Some(rx)),
                }),
                tx,
            )
        }
    }

    #[async_trait]
    impl InformerSource for ChannelSource {
        async fn start(&self) -> podmortem_watch::Result<update_mpsc::Receiver<PodUpdate>> {
            Ok(self.rx.lock().take().expect("source started twice"))
        }
    }

    struct FailingSource;

    #[async_trait]
    impl InformerSource for FailingSource {
        async fn start(&self) -> podmortem_watch::Result<update_mpsc::Receiver<PodUpdate>> {
            Err(podmortem_watch::WatchError::SyncFailed(
                "no cluster".to_string(),
            ))
        }
    }

    fn crashing_pod() -> PodSnapshot {
        PodSnapshot::new("prod", "api").with_container(
            ContainerStatus::new(
                "main",
                ContainerState::Terminated(TerminatedState {
                    exit_code: 137,
                    signal: 9,
                    reason: "OOMKilled".to_string(),
                    started_at: None,
                    finished_at: None,
                }),
            )
            .with_restart_count(1),
        )
    }

    fn test_config(dir: &std::path::Path) -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.http_addr = "127.0.0.1:0".to_string();
        config.reports.path = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn detected_crash_flows_into_the_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn Storage> = Arc::new(
            FileStore::new(dir.path(), Compression::None).expect("store"),
        );
        let (source, tx) = ChannelSource::new();

        let daemon = Daemon::new(DaemonOptions {
            config: test_config(dir.path()),
            store: store.clone(),
            notifiers: Vec::new(),
            pod_api: Arc::new(FakeApi),
            informer: source,
        })
        .expect("daemon");

        let metrics = daemon.metrics().clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = tokio::spawn(async move { daemon.run(shutdown_rx).await });

        tx.send(PodUpdate::Added(crashing_pod()))
            .await
            .expect("send update");

        // Wait for the pipeline to persist the report.
        let mut saved = Vec::new();
        for _ in 0..50 {
            saved = store.list().expect("list");
            if !saved.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].crash.reason, "OOMKilled");
        assert_eq!(saved[0].logs, vec!["boom"]);
        assert_eq!(metrics.get_crashes("prod", "OOMKilled"), 1);

        shutdown_tx.send(true).expect("signal shutdown");
        let result = run.await.expect("join");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn informer_sync_failure_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn Storage> = Arc::new(
            FileStore::new(dir.path(), Compression::None).expect("store"),
        );

        let daemon = Daemon::new(DaemonOptions {
            config: test_config(dir.path()),
            store,
            notifiers: Vec::new(),
            pod_api: Arc::new(FakeApi),
            informer: Arc::new(FailingSource),
        })
        .expect("daemon");

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let err = daemon.run(shutdown_rx).await.unwrap_err();
        assert!(matches!(err, DaemonError::Watch(_)));
    }

    #[tokio::test]
    async fn bind_failure_is_fatal() {
        let occupied = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind helper");
        let addr = occupied.local_addr().expect("addr").to_string();

        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = test_config(dir.path());
        config.http_addr = addr;

        let store: Arc<dyn Storage> = Arc::new(
            FileStore::new(dir.path(), Compression::None).expect("store"),
        );
        let (source, _tx) = ChannelSource::new();

        let daemon = Daemon::new(DaemonOptions {
            config,
            store,
            notifiers: Vec::new(),
            pod_api: Arc::new(FakeApi),
            informer: source,
        })
        .expect("daemon");

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let err = daemon.run(shutdown_rx).await.unwrap_err();
        assert!(matches!(err, DaemonError::Bind { .. }));
    }

    #[tokio::test]
    async fn invalid_redaction_pattern_fails_construction() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = test_config(dir.path());
        config.reports.redaction.enabled = true;
        config.reports.redaction.log_patterns = vec!["(broken".to_string()];

        let store: Arc<dyn Storage> = Arc::new(
            FileStore::new(dir.path(), Compression::None).expect("store"),
        );
        let (source, _tx) = ChannelSource::new();

        let err = Daemon::new(DaemonOptions {
            config,
            store,
            notifiers: Vec::new(),
            pod_api: Arc::new(FakeApi),
            informer: source,
        })
        .err()
        .expect("construction fails");
        assert!(matches!(err, DaemonError::Redaction(_)));
    }

    #[tokio::test]
    async fn prune_runs_immediately_on_startup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn Storage> = Arc::new(
            FileStore::new(dir.path(), Compression::None).expect("store"),
        );

        let mut old = ForensicReport::new(podmortem_core::PodCrash::new("prod", "api", "main"));
        old.collected_at = Utc::now() - chrono::Duration::days(30);
        store.save(&old).expect("seed old report");

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(prune_loop(
            store.clone(),
            Duration::from_secs(24 * 3600),
            Duration::from_secs(3600),
            shutdown_rx,
        ));

        for _ in 0..50 {
            if store.list().expect("list").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(store.list().expect("list").is_empty());
        handle.abort();
    }

    #[tokio::test]
    async fn prune_loop_is_inert_without_retention() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn Storage> = Arc::new(
            FileStore::new(dir.path(), Compression::None).expect("store"),
        );

        let mut old = ForensicReport::new(podmortem_core::PodCrash::new("prod", "api", "main"));
        old.collected_at = Utc::now() - chrono::Duration::days(30);
        store.save(&old).expect("seed old report");

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        prune_loop(
            store.clone(),
            Duration::ZERO,
            Duration::from_secs(3600),
            shutdown_rx,
        )
        .await;

        assert_eq!(store.list().expect("list").len(), 1);
    }
}
