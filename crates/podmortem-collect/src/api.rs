//! The read-only cluster surface the collectors pull from.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podmortem_core::PodSpec;

use crate::error::Result;

/// Options for a container log request.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Which container's logs to read.
    pub container: String,
    /// Read the terminated prior incarnation instead of the current one.
    pub previous: bool,
    /// Tail bound on the number of returned lines.
    pub tail_lines: i64,
    /// Prefix each line with its timestamp.
    pub timestamps: bool,
}

/// A field selector restricting an event list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSelector(String);

impl FieldSelector {
    /// Selector for events whose involved object is the given pod.
    #[must_use]
    pub fn involved_pod(pod: &str) -> Self {
        Self(format!("involvedObject.name={pod},involvedObject.kind=Pod"))
    }

    /// The rendered selector string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A cluster event as returned by the events API, before mapping into the
/// domain [`podmortem_core::Event`].
#[derive(Debug, Clone)]
pub struct ClusterEvent {
    /// `Warning` or `Normal`.
    pub event_type: String,
    /// Short machine reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// Occurrence count.
    pub count: i32,
    /// First occurrence.
    pub first_timestamp: Option<DateTime<Utc>>,
    /// Latest occurrence.
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Emitting component.
    pub source_component: String,
}

/// Read-only pod surface of the cluster API.
///
/// A production implementation wraps the cluster client; tests substitute
/// an in-memory fake. Implementations must honor the caller's cancellation:
/// every method is awaited under the crash handler's collection deadline.
#[async_trait]
pub trait PodApi: Send + Sync {
    /// Streams container logs and returns them as one buffer.
    async fn container_logs(&self, namespace: &str, pod: &str, opts: &LogOptions)
        -> Result<String>;

    /// Lists events matching the field selector in the namespace.
    async fn pod_events(
        &self,
        namespace: &str,
        selector: &FieldSelector,
    ) -> Result<Vec<ClusterEvent>>;

    /// Reads the declared pod spec.
    async fn pod_spec(&self, namespace: &str, pod: &str) -> Result<PodSpec>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_selector_renders_involved_object_query() {
        let selector = FieldSelector::involved_pod("api-7d4b");
        assert_eq!(
            selector.as_str(),
            "involvedObject.name=api-7d4b,involvedObject.kind=Pod"
        );
    }
}
