//! Synthetic cluster backend.
//!
//! Drives the full pipeline without a cluster: a scripted pod OOM-kills on
//! arrival and a second pod degrades into `CrashLoopBackOff`, while the
//! pod API serves canned logs (including a secret-looking line so
//! redaction has something to bite on), events and env. Useful for trying
//! sinks, the store and the reports API end to end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use podmortem_collect::{ClusterEvent, FieldSelector, LogOptions, PodApi};
use podmortem_core::{
    ContainerSpec, ContainerState, ContainerStatus, EnvSource, EnvValue, EnvVarSpec, PodSnapshot,
    PodSpec, TerminatedState,
};
use podmortem_watch::{InformerSource, PodUpdate};
use tokio::sync::mpsc;

const SCRIPT_STEP: Duration = Duration::from_millis(200);

/// The synthetic cluster: hands out a scripted informer and a canned pod
/// API over one namespace.
pub struct DemoCluster {
    namespace: String,
}

impl DemoCluster {
    /// Creates a demo cluster in the given namespace.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// The scripted informer.
    #[must_use]
    pub fn informer(&self) -> Arc<dyn InformerSource> {
        Arc::new(DemoSource {
            namespace: self.namespace.clone(),
        })
    }

    /// The canned pod API.
    #[must_use]
    pub fn pod_api(&self) -> Arc<dyn PodApi> {
        Arc::new(DemoPodApi)
    }
}

struct DemoSource {
    namespace: String,
}

#[async_trait]
impl InformerSource for DemoSource {
    async fn start(&self) -> podmortem_watch::Result<mpsc::Receiver<PodUpdate>> {
        let (tx, rx) = mpsc::channel(16);
        let namespace = self.namespace.clone();

        tokio::spawn(async move {
            let oom_pod = PodSnapshot::new(namespace.clone(), "checkout-5d8f").with_container(
                ContainerStatus::new(
                    "checkout",
                    ContainerState::Terminated(TerminatedState {
                        exit_code: 137,
                        signal: 9,
                        reason: "OOMKilled".to_string(),
                        started_at: None,
                        finished_at: Some(Utc::now()),
                    }),
                )
                .with_restart_count(3),
            );
            if tx.send(PodUpdate::Added(oom_pod)).await.is_err() {
                return;
            }

            tokio::time::sleep(SCRIPT_STEP).await;

            // The payments pod arrives with a prior termination already on
            // record (replayed as its own crash), then drops into backoff.
            let last_termination = TerminatedState {
                exit_code: 1,
                signal: 0,
                reason: "Error".to_string(),
                started_at: None,
                finished_at: Some(Utc::now()),
            };
            let running = PodSnapshot::new(namespace.clone(), "payments-7c9b").with_container(
                ContainerStatus::new("payments", ContainerState::Running)
                    .with_restart_count(5)
                    .with_last_termination(last_termination.clone()),
            );
            if tx.send(PodUpdate::Added(running.clone())).await.is_err() {
                return;
            }

            tokio::time::sleep(SCRIPT_STEP).await;

            let crash_looping = PodSnapshot::new(namespace, "payments-7c9b").with_container(
                ContainerStatus::new(
                    "payments",
                    ContainerState::Waiting {
                        reason: "CrashLoopBackOff".to_string(),
                    },
                )
                .with_restart_count(5)
                .with_last_termination(last_termination),
            );
            let _ = tx
                .send(PodUpdate::Updated {
                    old: running,
                    new: crash_looping,
                })
                .await;

            // Keep the watch open so the daemon stays up after the script.
            std::future::pending::<()>().await;
        });

        Ok(rx)
    }
}

struct DemoPodApi;

#[async_trait]
impl PodApi for DemoPodApi {
    async fn container_logs(
        &self,
        _namespace: &str,
        pod: &str,
        opts: &LogOptions,
    ) -> podmortem_collect::Result<String> {
        let incarnation = if opts.previous { "previous" } else { "current" };
        Ok(format!(
            "2000-01-01T00:00:01Z starting {pod} ({incarnation} incarnation)\n\
             2000-01-01T00:00:02Z connecting to db password=swordfish\n\
             2000-01-01T00:00:07Z allocation failure, aborting\n"
        ))
    }

    async fn pod_events(
        &self,
        _namespace: &str,
        _selector: &FieldSelector,
    ) -> podmortem_collect::Result<Vec<ClusterEvent>> {
        Ok(vec![ClusterEvent {
            event_type: "Warning".to_string(),
            reason: "BackOff".to_string(),
            message: "Back-off restarting failed container".to_string(),
            count: 4,
            first_timestamp: Some(Utc::now()),
            last_timestamp: Some(Utc::now()),
            source_component: "kubelet".to_string(),
        }])
    }

    async fn pod_spec(&self, _namespace: &str, pod: &str) -> podmortem_collect::Result<PodSpec> {
        let container = pod.split('-').next().unwrap_or(pod).to_string();
        Ok(PodSpec {
            containers: vec![ContainerSpec {
                name: container,
                env: vec![
                    EnvVarSpec {
                        name: "PORT".to_string(),
                        value: EnvValue::Literal("8080".to_string()),
                    },
                    EnvVarSpec {
                        name: "DB_PASSWORD".to_string(),
                        value: EnvValue::FromSource(EnvSource::SecretKey),
                    },
                ],
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use podmortem_core::PodCrash;
    use podmortem_watch::{CrashHandler, Watcher, WatcherConfig};
    use tokio::sync::watch;

    struct Recorder {
        crashes: Mutex<Vec<PodCrash>>,
    }

    #[async_trait]
    impl CrashHandler for Recorder {
        async fn handle_crash(&self, crash: PodCrash) {
            self.crashes.lock().push(crash);
        }
    }

    #[tokio::test]
    async fn demo_script_produces_all_three_crash_kinds() {
        let cluster = DemoCluster::new("demo");
        let recorder = Arc::new(Recorder {
            crashes: Mutex::new(Vec::new()),
        });
        let watcher = Watcher::new(recorder.clone(), WatcherConfig::default());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let informer = cluster.informer();
        let run = tokio::spawn(async move {
            let informer = informer;
            watcher.run(informer.as_ref(), shutdown_rx).await
        });

        // The script takes two steps plus slack.
        tokio::time::sleep(SCRIPT_STEP * 5).await;
        shutdown_tx.send(true).expect("signal shutdown");
        run.await.expect("join").expect("watcher run");

        let crashes = recorder.crashes.lock();
        assert_eq!(crashes.len(), 3);
        assert_eq!(crashes[0].reason, "OOMKilled");
        assert_eq!(crashes[0].pod_name, "checkout-5d8f");
        // The payments pod replays its prior termination on add...
        assert_eq!(crashes[1].reason, "Error");
        assert_eq!(crashes[1].pod_name, "payments-7c9b");
        // ...and then enters backoff.
        assert_eq!(crashes[2].reason, "CrashLoopBackOff");
        assert_eq!(crashes[2].exit_code, 1);
    }

    #[tokio::test]
    async fn demo_pod_api_serves_every_source() {
        let api = DemoPodApi;

        let logs = api
            .container_logs(
                "demo",
                "checkout-5d8f",
                &LogOptions {
                    container: "checkout".to_string(),
                    previous: false,
                    tail_lines: 1000,
                    timestamps: true,
                },
            )
            .await
            .expect("logs");
        assert!(logs.contains("password=swordfish"));

        let events = api
            .pod_events("demo", &FieldSelector::involved_pod("checkout-5d8f"))
            .await
            .expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason, "BackOff");

        let spec = api.pod_spec("demo", "checkout-5d8f").await.expect("spec");
        assert_eq!(spec.containers[0].name, "checkout");
        assert_eq!(spec.containers[0].env.len(), 2);
    }
}
