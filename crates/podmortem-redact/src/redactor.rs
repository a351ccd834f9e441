//! The redaction policy and its application.

use regex::Regex;
use serde::{Deserialize, Serialize};

use podmortem_core::{ForensicReport, FROM_SOURCE};

use crate::error::Result;
use crate::glob::glob_match;

/// Default replacement token.
const DEFAULT_REPLACEMENT: &str = "***";

/// Redaction policy, usually loaded from the daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    /// Master switch; when false no redactor is built.
    pub enabled: bool,
    /// Env keys to keep; when non-empty, everything else is redacted.
    pub env_allowlist: Vec<String>,
    /// Env keys to redact.
    pub env_denylist: Vec<String>,
    /// Log rules, each `regex` or `regex=>replacement`.
    pub log_patterns: Vec<String>,
    /// Replacement token; empty means `***`.
    pub replacement: String,
    /// Also redact values equal to the `[from-source]` sentinel.
    pub redact_from_source: bool,
}

struct CompiledRule {
    re: Regex,
    replacement: String,
}

/// Masks secrets in a report's env vars and log lines, in place.
///
/// Applying the redactor twice yields the same report as applying it once.
pub struct Redactor {
    replacement: String,
    env_allowlist: Vec<String>,
    env_denylist: Vec<String>,
    log_rules: Vec<CompiledRule>,
    redact_from_source: bool,
}

impl Redactor {
    /// Builds a redactor from the policy; `Ok(None)` when redaction is
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured log pattern is not a valid
    /// regular expression.
    pub fn from_config(cfg: &RedactionConfig) -> Result<Option<Self>> {
        if !cfg.enabled {
            return Ok(None);
        }

        let replacement = {
            let trimmed = cfg.replacement.trim();
            if trimmed.is_empty() {
                DEFAULT_REPLACEMENT.to_string()
            } else {
                trimmed.to_string()
            }
        };

        let patterns = if cfg.log_patterns.is_empty() {
            default_log_patterns()
        } else {
            cfg.log_patterns.clone()
        };

        let mut log_rules = Vec::with_capacity(patterns.len());
        for raw in &patterns {
            let (pattern, rule_replacement) = split_rule(raw, &replacement);
            if pattern.trim().is_empty() {
                continue;
            }
            let re = Regex::new(&pattern)?;
            log_rules.push(CompiledRule {
                re,
                replacement: rule_replacement,
            });
        }

        Ok(Some(Self {
            replacement,
            env_allowlist: cfg.env_allowlist.clone(),
            env_denylist: cfg.env_denylist.clone(),
            log_rules,
            redact_from_source: cfg.redact_from_source,
        }))
    }

    /// Applies the policy to the report in place.
    pub fn apply(&self, report: &mut ForensicReport) {
        for (key, value) in &mut report.env_vars {
            if !self.redact_from_source && value.as_str() == FROM_SOURCE {
                continue;
            }

            let redact = if !self.env_allowlist.is_empty() && !match_any(&self.env_allowlist, key)
            {
                true
            } else if self.env_allowlist.is_empty() && self.env_denylist.is_empty() {
                true
            } else {
                !self.env_denylist.is_empty() && match_any(&self.env_denylist, key)
            };

            if redact {
                value.clone_from(&self.replacement);
            }
        }

        self.redact_lines(&mut report.logs);
        self.redact_lines(&mut report.previous_log);
    }

    fn redact_lines(&self, lines: &mut [String]) {
        if lines.is_empty() || self.log_rules.is_empty() {
            return;
        }

        for line in lines.iter_mut() {
            for rule in &self.log_rules {
                if let std::borrow::Cow::Owned(redacted) =
                    rule.re.replace_all(line, rule.replacement.as_str())
                {
                    *line = redacted;
                }
            }
        }
    }
}

fn match_any(patterns: &[String], key: &str) -> bool {
    patterns.iter().any(|pattern| {
        let pattern = pattern.trim();
        !pattern.is_empty() && (pattern == key || glob_match(pattern, key))
    })
}

/// Splits `regex=>replacement` into its parts; a rule without `=>` uses
/// the fallback replacement token.
fn split_rule(raw: &str, fallback: &str) -> (String, String) {
    let raw = raw.trim();
    match raw.split_once("=>") {
        Some((pattern, replacement)) => {
            (pattern.trim().to_string(), replacement.trim().to_string())
        }
        None => (raw.to_string(), fallback.to_string()),
    }
}

fn default_log_patterns() -> Vec<String> {
    vec![
        r"(?i)((?:authorization|x-authorization)\s*:\s*bearer\s+)\S+=>${1}***".to_string(),
        r"(?i)((?:token|api[_-]?key|secret|password)\s*[:=]\s*)\S+=>${1}***".to_string(),
        r"(?i)((?:client[_-]?secret)\s*[:=]\s*)\S+=>${1}***".to_string(),
    ]
}
