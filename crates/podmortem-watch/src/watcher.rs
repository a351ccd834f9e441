//! The crash detector.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use podmortem_core::pod::CRASH_LOOP_BACK_OFF;
use podmortem_core::{ContainerStatus, PodCrash, PodSnapshot, TerminatedState};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::Result;
use crate::source::{CrashHandler, InformerSource, PodUpdate};

/// How often expired dedup entries are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Configuration for the [`Watcher`].
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Only handle pods in this namespace; `None` watches all namespaces.
    pub namespace: Option<String>,
    /// Crash reasons that are handled; anything else is discarded.
    pub reasons: HashSet<String>,
    /// Suppression window for repeated crashes with the same
    /// `(namespace, pod, container, reason)` key.
    pub dedup_ttl: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            reasons: ["OOMKilled", "Error", CRASH_LOOP_BACK_OFF]
                .iter()
                .map(ToString::to_string)
                .collect(),
            dedup_ttl: Duration::from_secs(300),
        }
    }
}

impl WatcherConfig {
    /// Replaces the allowed reason set. An empty slice keeps the defaults.
    #[must_use]
    pub fn with_reasons(mut self, reasons: &[String]) -> Self {
        if !reasons.is_empty() {
            self.reasons = reasons.iter().cloned().collect();
        }
        self
    }

    /// Restricts watching to one namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the dedup window.
    #[must_use]
    pub const fn with_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }
}

/// Differential crash detector over an informer stream.
///
/// For every container status in an incoming pod, the watcher compares
/// against the same index in the previously cached pod (or nothing on add)
/// and emits at most one crash per container per update, drawn from the
/// first matching rule:
///
/// 1. the current state newly became terminated,
/// 2. the last-termination state newly appeared or the restart count grew,
/// 3. the container newly entered `CrashLoopBackOff` waiting.
///
/// Crashes that survive the reason allowlist pass through a dedup window
/// before reaching the handler.
pub struct Watcher {
    config: WatcherConfig,
    handler: Arc<dyn CrashHandler>,
    last_notifications: RwLock<HashMap<String, Instant>>,
}

impl Watcher {
    /// Creates a watcher delivering crashes to `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn CrashHandler>, config: WatcherConfig) -> Self {
        Self {
            config,
            handler,
            last_notifications: RwLock::new(HashMap::new()),
        }
    }

    /// Consumes the source's update stream until shutdown.
    ///
    /// Detection is strictly sequential per update, which keeps the
    /// pairwise old/new comparison meaningful for a given pod.
    ///
    /// # Errors
    ///
    /// Returns an error if the informer cache fails to synchronize during
    /// startup. Runtime source errors do not terminate the watcher.
    pub async fn run(
        &self,
        source: &dyn InformerSource,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut updates = source.start().await?;
        info!("informer cache synced, watching for crash transitions");

        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        sweep.tick().await; // the first tick completes immediately

        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = sweep.tick() => self.sweep_dedup(),
                update = updates.recv() => match update {
                    Some(update) => self.process(update).await,
                    None => return Ok(()),
                },
            }
        }
    }

    async fn process(&self, update: PodUpdate) {
        match update {
            PodUpdate::Added(pod) => self.scan(None, &pod).await,
            PodUpdate::Updated { old, new } => self.scan(Some(&old), &new).await,
            PodUpdate::Deleted(_) => {}
        }
    }

    async fn scan(&self, old: Option<&PodSnapshot>, new: &PodSnapshot) {
        if let Some(ns) = &self.config.namespace {
            if ns != &new.namespace {
                return;
            }
        }

        for (i, status) in new.containers.iter().enumerate() {
            let old_status = old.and_then(|o| o.containers.get(i));
            if let Some(crash) = self.check_container_crash(new, status, old_status) {
                if self.should_notify(&crash) {
                    debug!(
                        namespace = %crash.namespace,
                        pod = %crash.pod_name,
                        container = %crash.container_name,
                        reason = %crash.reason,
                        exit_code = crash.exit_code,
                        "crash detected"
                    );
                    self.handler.handle_crash(crash).await;
                }
            }
        }
    }

    fn check_container_crash(
        &self,
        pod: &PodSnapshot,
        status: &ContainerStatus,
        old: Option<&ContainerStatus>,
    ) -> Option<PodCrash> {
        if let Some(terminated) = status.state.terminated() {
            if old.is_none_or(|o| o.state.terminated().is_none()) {
                return self.crash_from_terminated(pod, status, terminated);
            }
        }

        if let Some(terminated) = &status.last_termination {
            let newly_terminated = match old {
                None => true,
                Some(o) => {
                    o.last_termination.is_none() || status.restart_count > o.restart_count
                }
            };
            if newly_terminated {
                return self.crash_from_terminated(pod, status, terminated);
            }
        }

        if status.state.is_crash_loop_waiting()
            && !old.is_some_and(|o| o.state.is_crash_loop_waiting())
        {
            return self.crash_loop_back_off(pod, status);
        }

        None
    }

    fn crash_from_terminated(
        &self,
        pod: &PodSnapshot,
        status: &ContainerStatus,
        terminated: &TerminatedState,
    ) -> Option<PodCrash> {
        let reason = if terminated.reason.is_empty() {
            "Error".to_string()
        } else {
            terminated.reason.clone()
        };

        if !self.should_handle(&reason) {
            return None;
        }

        Some(PodCrash {
            namespace: pod.namespace.clone(),
            pod_name: pod.name.clone(),
            container_name: status.name.clone(),
            exit_code: terminated.exit_code,
            reason,
            signal: terminated.signal,
            restart_count: status.restart_count,
            started_at: terminated.started_at,
            finished_at: terminated.finished_at,
        })
    }

    fn crash_loop_back_off(&self, pod: &PodSnapshot, status: &ContainerStatus) -> Option<PodCrash> {
        if !self.should_handle(CRASH_LOOP_BACK_OFF) {
            return None;
        }

        let mut crash = PodCrash::new(pod.namespace.clone(), pod.name.clone(), status.name.clone());
        crash.reason = CRASH_LOOP_BACK_OFF.to_string();
        crash.restart_count = status.restart_count;

        if let Some(terminated) = &status.last_termination {
            crash.exit_code = terminated.exit_code;
            crash.signal = terminated.signal;
            crash.started_at = terminated.started_at;
            crash.finished_at = terminated.finished_at;
        }

        Some(crash)
    }

    fn should_handle(&self, reason: &str) -> bool {
        self.config.reasons.contains(reason)
    }

    fn should_notify(&self, crash: &PodCrash) -> bool {
        let key = format!(
            "{}/{}/{}/{}",
            crash.namespace, crash.pod_name, crash.container_name, crash.reason
        );

        let mut notifications = self.last_notifications.write();
        if let Some(last) = notifications.get(&key) {
            if last.elapsed() < self.config.dedup_ttl {
                return false;
            }
        }

        notifications.insert(key, Instant::now());
        true
    }

    /// Evicts dedup entries that have not reappeared for `2 × dedup_ttl`.
    pub fn sweep_dedup(&self) {
        let horizon = self.config.dedup_ttl * 2;
        self.last_notifications
            .write()
            .retain(|_, last| last.elapsed() <= horizon);
    }

    /// Number of live dedup entries.
    #[must_use]
    pub fn dedup_len(&self) -> usize {
        self.last_notifications.read().len()
    }
}
