//! Prometheus metrics for the crash pipeline.
//!
//! Three series:
//! - `podmortem_crashes_total{namespace,reason}` — counter
//! - `podmortem_report_size_bytes` — histogram, exponential buckets
//!   (start 1024, factor 2, 10 buckets)
//! - `podmortem_notifications_sent_total{notifier,status}` — counter

use std::sync::Arc;

use parking_lot::RwLock;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Label set for the crash counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CrashLabels {
    /// Namespace of the crashed pod.
    pub namespace: String,
    /// Crash reason.
    pub reason: String,
}

/// Label set for the notification counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct NotificationLabels {
    /// Sink name.
    pub notifier: String,
    /// `success` or `failure`.
    pub status: String,
}

/// Cloneable handle over the daemon's metrics registry.
///
/// The registry is an injectable dependency rather than a process
/// singleton: each daemon owns one, registered exactly once at
/// construction, and clones share state.
#[derive(Clone)]
pub struct DaemonMetrics {
    registry: Arc<RwLock<Registry>>,
    crashes_total: Family<CrashLabels, Counter>,
    report_size_bytes: Histogram,
    notifications_sent_total: Family<NotificationLabels, Counter>,
}

impl std::fmt::Debug for DaemonMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonMetrics").finish_non_exhaustive()
    }
}

impl Default for DaemonMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonMetrics {
    /// Creates a registry with all three series registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let crashes_total = Family::<CrashLabels, Counter>::default();
        registry.register(
            "podmortem_crashes",
            "Total number of pod crashes detected",
            crashes_total.clone(),
        );

        let report_size_bytes = Histogram::new(exponential_buckets(1024.0, 2.0, 10));
        registry.register(
            "podmortem_report_size_bytes",
            "Size of forensic reports in bytes",
            report_size_bytes.clone(),
        );

        let notifications_sent_total = Family::<NotificationLabels, Counter>::default();
        registry.register(
            "podmortem_notifications_sent",
            "Total number of notifications sent",
            notifications_sent_total.clone(),
        );

        Self {
            registry: Arc::new(RwLock::new(registry)),
            crashes_total,
            report_size_bytes,
            notifications_sent_total,
        }
    }

    /// Counts one detected crash.
    pub fn inc_crashes(&self, namespace: &str, reason: &str) {
        self.crashes_total
            .get_or_create(&CrashLabels {
                namespace: namespace.to_string(),
                reason: reason.to_string(),
            })
            .inc();
    }

    /// Current crash count for a label pair.
    #[must_use]
    pub fn get_crashes(&self, namespace: &str, reason: &str) -> u64 {
        self.crashes_total
            .get_or_create(&CrashLabels {
                namespace: namespace.to_string(),
                reason: reason.to_string(),
            })
            .get()
    }

    /// Records one persisted report's size in bytes.
    pub fn observe_report_size(&self, bytes: f64) {
        self.report_size_bytes.observe(bytes);
    }

    /// Counts one notification delivery outcome.
    pub fn inc_notification(&self, notifier: &str, success: bool) {
        self.notifications_sent_total
            .get_or_create(&NotificationLabels {
                notifier: notifier.to_string(),
                status: if success { "success" } else { "failure" }.to_string(),
            })
            .inc();
    }

    /// Current notification count for a label pair.
    #[must_use]
    pub fn get_notifications(&self, notifier: &str, status: &str) -> u64 {
        self.notifications_sent_total
            .get_or_create(&NotificationLabels {
                notifier: notifier.to_string(),
                status: status.to_string(),
            })
            .get()
    }

    /// Renders the Prometheus text exposition.
    #[must_use]
    pub fn encode(&self) -> String {
        let registry = self.registry.read();
        let mut buffer = String::new();
        if encode(&mut buffer, &registry).is_err() {
            tracing::error!("failed to encode prometheus metrics");
            return String::new();
        }
        buffer
    }

    /// The Content-Type header value for the exposition format.
    #[must_use]
    pub const fn content_type() -> &'static str {
        "text/plain; version=0.0.4; charset=utf-8"
    }
}
