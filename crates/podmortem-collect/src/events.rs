//! Cluster event collection.

use std::sync::Arc;

use podmortem_core::Event;

use crate::api::{ClusterEvent, FieldSelector, PodApi};
use crate::error::Result;

/// Pulls cluster events involving a pod.
pub struct EventCollector {
    api: Arc<dyn PodApi>,
}

impl EventCollector {
    /// Creates an event collector.
    #[must_use]
    pub fn new(api: Arc<dyn PodApi>) -> Self {
        Self { api }
    }

    /// Lists events whose involved object is the given pod, mapped into
    /// the domain entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the event list query fails.
    pub async fn for_pod(&self, namespace: &str, pod: &str) -> Result<Vec<Event>> {
        let selector = FieldSelector::involved_pod(pod);
        let raw = self.api.pod_events(namespace, &selector).await?;
        Ok(raw.into_iter().map(into_domain_event).collect())
    }
}

fn into_domain_event(raw: ClusterEvent) -> Event {
    Event {
        event_type: raw.event_type,
        reason: raw.reason,
        message: raw.message,
        count: raw.count,
        first_seen: raw.first_timestamp,
        last_seen: raw.last_timestamp,
        source: raw.source_component,
    }
}
