//! Pod status and spec snapshots.
//!
//! These are the observer-side views of a pod: [`PodSnapshot`] carries the
//! container statuses the watcher diffs, [`PodSpec`] carries the declared
//! environment the collector reads. Both are deliberately small — only the
//! fields the pipeline consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Waiting reason that marks a container stuck in a restart backoff loop.
pub const CRASH_LOOP_BACK_OFF: &str = "CrashLoopBackOff";

/// A point-in-time view of a pod's container statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSnapshot {
    /// Namespace the pod lives in.
    pub namespace: String,
    /// Pod name.
    pub name: String,
    /// Container statuses in spec order.
    #[serde(default)]
    pub containers: Vec<ContainerStatus>,
}

impl PodSnapshot {
    /// Creates a snapshot with no container statuses.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            containers: Vec::new(),
        }
    }

    /// Adds a container status.
    #[must_use]
    pub fn with_container(mut self, container: ContainerStatus) -> Self {
        self.containers.push(container);
        self
    }
}

/// Status of a single container within a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    /// Container name.
    pub name: String,
    /// How many times the container has restarted.
    #[serde(default)]
    pub restart_count: u32,
    /// Current state.
    pub state: ContainerState,
    /// Details of the previous incarnation's termination, when one exists.
    #[serde(default)]
    pub last_termination: Option<TerminatedState>,
}

impl ContainerStatus {
    /// Creates a status in the given state with zero restarts.
    #[must_use]
    pub fn new(name: impl Into<String>, state: ContainerState) -> Self {
        Self {
            name: name.into(),
            restart_count: 0,
            state,
            last_termination: None,
        }
    }

    /// Sets the restart count.
    #[must_use]
    pub const fn with_restart_count(mut self, count: u32) -> Self {
        self.restart_count = count;
        self
    }

    /// Sets the last-termination details.
    #[must_use]
    pub fn with_last_termination(mut self, terminated: TerminatedState) -> Self {
        self.last_termination = Some(terminated);
        self
    }
}

/// The state of a container at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    /// The container is running.
    Running,
    /// The container is waiting to run, with the control plane's reason.
    Waiting {
        /// Why the container is waiting, e.g. `CrashLoopBackOff`.
        reason: String,
    },
    /// The container has terminated.
    Terminated(TerminatedState),
}

impl ContainerState {
    /// The termination details, when the container is terminated.
    #[must_use]
    pub const fn terminated(&self) -> Option<&TerminatedState> {
        match self {
            Self::Terminated(t) => Some(t),
            _ => None,
        }
    }

    /// The waiting reason, when the container is waiting.
    #[must_use]
    pub fn waiting_reason(&self) -> Option<&str> {
        match self {
            Self::Waiting { reason } => Some(reason.as_str()),
            _ => None,
        }
    }

    /// True when the container is waiting in `CrashLoopBackOff`.
    #[must_use]
    pub fn is_crash_loop_waiting(&self) -> bool {
        self.waiting_reason() == Some(CRASH_LOOP_BACK_OFF)
    }
}

/// Details of a container termination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminatedState {
    /// Process exit code.
    pub exit_code: i32,
    /// Terminating signal, when one was delivered.
    #[serde(default)]
    pub signal: i32,
    /// Reason reported by the control plane; may be empty.
    #[serde(default)]
    pub reason: String,
    /// When the incarnation started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the incarnation finished.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// The declared spec of a pod, reduced to what env collection needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    /// Containers declared by the pod.
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

/// A single container's declared spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Declared environment variables in declaration order.
    #[serde(default)]
    pub env: Vec<EnvVarSpec>,
}

/// One declared environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVarSpec {
    /// Variable name.
    pub name: String,
    /// Literal value or indirection.
    pub value: EnvValue,
}

/// Where an environment variable's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvValue {
    /// An inline literal value.
    Literal(String),
    /// A value resolved from another object at container start.
    FromSource(EnvSource),
}

/// The kind of indirection behind a non-literal env value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvSource {
    /// `configMapKeyRef`
    ConfigMapKey,
    /// `secretKeyRef`
    SecretKey,
    /// `fieldRef` / `resourceFieldRef`
    FieldRef,
}
