//! Retention pruning for the file store.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::Result;
use crate::file_store::{open_reader, FileStore};
use crate::storage::PruneResult;

impl FileStore {
    /// One retention sweep over every report file, caller holding the
    /// write lock. A report whose collection timestamp cannot be read
    /// falls back to the file's mtime; the sweep never aborts mid-way.
    pub(crate) fn prune_locked(&self, retention: Duration) -> Result<PruneResult> {
        let mut result = PruneResult::default();
        if retention.is_zero() {
            return Ok(result);
        }

        let files = self.files_all()?;
        let now = Utc::now();
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);

        for path in files {
            let collected_at = match read_collected_at(&path) {
                Ok(at) => at,
                Err(_) => match file_mtime(&path) {
                    Ok(at) => at,
                    Err(e) => {
                        result.failed += 1;
                        result
                            .first_error
                            .get_or_insert_with(|| format!("failed to stat report: {e}"));
                        continue;
                    }
                },
            };

            if now.signed_duration_since(collected_at) <= retention {
                result.kept += 1;
                continue;
            }

            match fs::remove_file(&path) {
                Ok(()) => result.deleted += 1,
                Err(e) => {
                    result.failed += 1;
                    result
                        .first_error
                        .get_or_insert_with(|| format!("failed to delete report: {e}"));
                }
            }
        }

        Ok(result)
    }
}

/// Partial decode of just the collection timestamp; unknown fields are
/// ignored.
#[derive(Deserialize)]
struct CollectedAtProbe {
    #[serde(rename = "CollectedAt")]
    collected_at: DateTime<Utc>,
}

fn read_collected_at(path: &Path) -> Result<DateTime<Utc>> {
    let probe: CollectedAtProbe = serde_json::from_reader(open_reader(path)?)?;
    Ok(probe.collected_at)
}

fn file_mtime(path: &Path) -> Result<DateTime<Utc>> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Utc>::from(modified))
}
