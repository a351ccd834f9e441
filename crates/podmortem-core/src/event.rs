//! Cluster events attached to forensic reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cluster-side event associated with a pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    /// Event type, `Warning` or `Normal`.
    #[serde(rename = "Type")]
    pub event_type: String,
    /// Short machine reason, e.g. `BackOff` or `FailedScheduling`.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
    /// How many times this event has occurred.
    #[serde(default)]
    pub count: i32,
    /// First occurrence, when known.
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    /// Most recent occurrence, when known.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Component that emitted the event.
    #[serde(default)]
    pub source: String,
}

impl Event {
    /// Creates an event with type, reason and message; counters and
    /// timestamps start empty.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            reason: reason.into(),
            message: message.into(),
            count: 0,
            first_seen: None,
            last_seen: None,
            source: String::new(),
        }
    }

    /// Returns true for `Warning` events.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.event_type == "Warning"
    }

    /// Returns true for `Normal` events.
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.event_type == "Normal"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_predicates() {
        let warning = Event::new("Warning", "BackOff", "restarting failed container");
        assert!(warning.is_warning());
        assert!(!warning.is_normal());

        let normal = Event::new("Normal", "Pulled", "image already present");
        assert!(normal.is_normal());
        assert!(!normal.is_warning());
    }

    #[test]
    fn serializes_type_field_name() {
        let event = Event::new("Warning", "BackOff", "restarting failed container");
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["Type"], "Warning");
        assert_eq!(json["Reason"], "BackOff");
        assert_eq!(json["Source"], "");
    }

    #[test]
    fn serialization_roundtrip() {
        let event = Event {
            event_type: "Warning".to_string(),
            reason: "Unhealthy".to_string(),
            message: "liveness probe failed".to_string(),
            count: 4,
            first_seen: Some(Utc::now()),
            last_seen: Some(Utc::now()),
            source: "kubelet".to_string(),
        };

        let json = serde_json::to_string(&event).expect("serialize");
        let parsed: Event = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(event, parsed);
    }
}
