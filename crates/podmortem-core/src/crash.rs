//! The crash entity produced by the watcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single detected container crash.
///
/// Identified by `(namespace, pod_name, container_name)`; all three are
/// non-empty for any crash that reaches the collector. Timestamps may be
/// absent when the control plane did not report them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PodCrash {
    /// Namespace of the crashed pod.
    pub namespace: String,
    /// Name of the crashed pod.
    pub pod_name: String,
    /// Name of the crashed container within the pod.
    pub container_name: String,
    /// Exit code of the terminated process.
    #[serde(default)]
    pub exit_code: i32,
    /// Crash reason (`OOMKilled`, `Error`, `CrashLoopBackOff`, or any other
    /// reason reported by the control plane).
    pub reason: String,
    /// Signal that terminated the process, when one did.
    #[serde(default)]
    pub signal: i32,
    /// Restart count of the container at detection time.
    #[serde(default)]
    pub restart_count: u32,
    /// When the crashed incarnation started, when known.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the crashed incarnation terminated, when known.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PodCrash {
    /// Creates a crash with only its identity set.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
            exit_code: 0,
            reason: String::new(),
            signal: 0,
            restart_count: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// Returns true if the container was killed by the memory controller.
    #[must_use]
    pub fn is_oom_killed(&self) -> bool {
        self.reason == "OOMKilled"
    }

    /// Returns true if the container is in a restart backoff loop.
    #[must_use]
    pub fn is_crash_loop_back_off(&self) -> bool {
        self.reason == "CrashLoopBackOff"
    }

    /// Returns `namespace/pod` for display.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.namespace, self.pod_name)
    }
}
