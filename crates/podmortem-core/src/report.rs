//! The aggregate forensic artifact.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::crash::PodCrash;
use crate::event::Event;

/// Sentinel recorded for env entries whose value comes from indirection
/// (secretRef, configMapRef, fieldRef) and was not resolved at collection
/// time.
pub const FROM_SOURCE: &str = "[from-source]";

/// The forensic report captured for a single detected crash.
///
/// Born in the collector, optionally redacted in place, then written to
/// sinks. The `id` and `collected_at` fields are set at creation and never
/// change; warnings and events are append-only, logs and env replace-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ForensicReport {
    /// 16 lowercase hex characters, unique across a store with
    /// overwhelming probability.
    #[serde(rename = "ID")]
    pub id: String,
    /// The crash this report was captured for.
    pub crash: PodCrash,
    /// Recent log lines from the current incarnation.
    #[serde(default)]
    pub logs: Vec<String>,
    /// Log lines from the terminated prior incarnation.
    #[serde(default)]
    pub previous_log: Vec<String>,
    /// Cluster events involving the pod.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Declared container environment; indirected values carry
    /// [`FROM_SOURCE`].
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    /// Partial-collection failures, one entry per failed source.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// When collection started.
    pub collected_at: DateTime<Utc>,
}

impl ForensicReport {
    /// Creates an empty report for the given crash with a fresh random id.
    #[must_use]
    pub fn new(crash: PodCrash) -> Self {
        Self {
            id: generate_id(),
            crash,
            logs: Vec::new(),
            previous_log: Vec::new(),
            events: Vec::new(),
            env_vars: BTreeMap::new(),
            warnings: Vec::new(),
            collected_at: Utc::now(),
        }
    }

    /// Replaces the current-incarnation log lines.
    pub fn set_logs(&mut self, logs: Vec<String>) {
        self.logs = logs;
    }

    /// Replaces the prior-incarnation log lines.
    pub fn set_previous_logs(&mut self, logs: Vec<String>) {
        self.previous_log = logs;
    }

    /// Appends a cluster event.
    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Records one environment variable.
    pub fn set_env_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_vars.insert(key.into(), value.into());
    }

    /// Appends a partial-collection warning.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Number of `Warning`-typed events captured.
    #[must_use]
    pub fn warning_event_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_warning()).count()
    }

    /// One-line description: `namespace/pod - reason`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} - {}", self.crash.full_name(), self.crash.reason)
    }

    /// True when current-incarnation logs were captured.
    #[must_use]
    pub fn has_logs(&self) -> bool {
        !self.logs.is_empty()
    }

    /// True when prior-incarnation logs were captured.
    #[must_use]
    pub fn has_previous_logs(&self) -> bool {
        !self.previous_log.is_empty()
    }

    /// True when any cluster events were captured.
    #[must_use]
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

fn generate_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
