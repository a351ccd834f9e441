//! Daemon configuration.
//!
//! Loaded from a JSON file, then overridden by `PODMORTEM_*` environment
//! variables (dot-separated config keys map to underscores, e.g.
//! `reports.compression` → `PODMORTEM_REPORTS_COMPRESSION`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use podmortem_redact::RedactionConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, Result};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "PODMORTEM_";

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to the kubeconfig handed to the cluster integration.
    pub kubeconfig: Option<PathBuf>,
    /// Cluster context name handed to the cluster integration.
    pub context: Option<String>,
    /// Namespace to watch; empty watches all namespaces.
    pub namespace: String,
    /// HTTP listen address for health, metrics and the reports API.
    pub http_addr: String,
    /// Per-crash evidence collection deadline in seconds; 0 means the
    /// 20-second default.
    pub collect_timeout_secs: u64,
    /// Report persistence settings.
    pub reports: ReportsConfig,
    /// Reports API settings.
    pub api: ApiConfig,
    /// Watcher settings.
    pub watch: WatchConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            namespace: String::new(),
            http_addr: default_http_addr(),
            collect_timeout_secs: default_collect_timeout_secs(),
            reports: ReportsConfig::default(),
            api: ApiConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

/// Report persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Directory reports are written to.
    pub path: PathBuf,
    /// Retention in seconds; 0 disables pruning.
    pub retention_secs: u64,
    /// `none` or `gzip`.
    pub compression: String,
    /// Seconds between retention sweeps; 0 means the hourly default.
    pub prune_interval_secs: u64,
    /// Redaction policy.
    pub redaction: RedactionConfig,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("reports"),
            retention_secs: default_retention_secs(),
            compression: "none".to_string(),
            prune_interval_secs: default_prune_interval_secs(),
            redaction: RedactionConfig::default(),
        }
    }
}

/// Reports API settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Expose `/reports` and `/reports/{id}`.
    pub reports_enabled: bool,
    /// Bearer token required on the reports endpoints; empty disables auth.
    pub token: String,
    /// Allow `?full=true` to return complete report bodies.
    pub allow_full: bool,
}

/// Watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Crash reasons that are handled.
    pub reasons: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reasons: vec![
                "OOMKilled".to_string(),
                "Error".to_string(),
                "CrashLoopBackOff".to_string(),
            ],
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

const fn default_collect_timeout_secs() -> u64 {
    20
}

const fn default_retention_secs() -> u64 {
    7 * 24 * 3600
}

const fn default_prune_interval_secs() -> u64 {
    3600
}

impl DaemonConfig {
    /// Loads configuration: defaults, overlaid by the optional JSON file,
    /// overlaid by `PODMORTEM_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly given file cannot be read or
    /// parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(path).map_err(|e| DaemonError::ReadConfig {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                serde_json::from_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(std::env::vars());
        Ok(config)
    }

    /// Applies `PODMORTEM_*` overrides from the given variable set.
    pub fn apply_env_overrides(&mut self, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            let Some(key) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match key {
                "KUBECONFIG" => self.kubeconfig = Some(PathBuf::from(value)),
                "CONTEXT" => self.context = Some(value),
                "NAMESPACE" => self.namespace = value,
                "HTTP_ADDR" => self.http_addr = value,
                "COLLECT_TIMEOUT_SECS" => parse_into(&value, &mut self.collect_timeout_secs),
                "REPORTS_PATH" => self.reports.path = PathBuf::from(value),
                "REPORTS_RETENTION_SECS" => parse_into(&value, &mut self.reports.retention_secs),
                "REPORTS_COMPRESSION" => self.reports.compression = value,
                "REPORTS_PRUNE_INTERVAL_SECS" => {
                    parse_into(&value, &mut self.reports.prune_interval_secs);
                }
                "REPORTS_REDACTION_ENABLED" => {
                    parse_into(&value, &mut self.reports.redaction.enabled);
                }
                "REPORTS_REDACTION_ENV_ALLOWLIST" => {
                    self.reports.redaction.env_allowlist = split_list(&value);
                }
                "REPORTS_REDACTION_ENV_DENYLIST" => {
                    self.reports.redaction.env_denylist = split_list(&value);
                }
                "REPORTS_REDACTION_LOG_PATTERNS" => {
                    self.reports.redaction.log_patterns = split_list(&value);
                }
                "REPORTS_REDACTION_REPLACEMENT" => self.reports.redaction.replacement = value,
                "REPORTS_REDACTION_REDACT_FROM_SOURCE" => {
                    parse_into(&value, &mut self.reports.redaction.redact_from_source);
                }
                "API_REPORTS_ENABLED" => parse_into(&value, &mut self.api.reports_enabled),
                "API_TOKEN" => self.api.token = value,
                "API_ALLOW_FULL" => parse_into(&value, &mut self.api.allow_full),
                "WATCH_REASONS" => self.watch.reasons = split_list(&value),
                _ => {}
            }
        }
    }

    /// Per-crash collection deadline.
    #[must_use]
    pub const fn collect_timeout(&self) -> Duration {
        let secs = if self.collect_timeout_secs == 0 {
            default_collect_timeout_secs()
        } else {
            self.collect_timeout_secs
        };
        Duration::from_secs(secs)
    }

    /// Report retention; zero disables pruning.
    #[must_use]
    pub const fn retention(&self) -> Duration {
        Duration::from_secs(self.reports.retention_secs)
    }

    /// Interval between retention sweeps.
    #[must_use]
    pub const fn prune_interval(&self) -> Duration {
        let secs = if self.reports.prune_interval_secs == 0 {
            default_prune_interval_secs()
        } else {
            self.reports.prune_interval_secs
        };
        Duration::from_secs(secs)
    }
}

fn parse_into<T: std::str::FromStr>(value: &str, target: &mut T) {
    if let Ok(parsed) = value.trim().parse() {
        *target = parsed;
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}
