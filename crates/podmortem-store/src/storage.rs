//! The persistence contract.

use std::path::PathBuf;
use std::time::Duration;

use podmortem_core::ForensicReport;

use crate::error::Result;

/// Outcome of a save that can report its on-disk footprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    /// Bytes written to disk (compressed size when compression is on).
    pub bytes_written: u64,
    /// Final path of the persisted report.
    pub path: PathBuf,
}

/// Outcome of a retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneResult {
    /// Reports deleted because they aged past retention.
    pub deleted: usize,
    /// Reports still within retention.
    pub kept: usize,
    /// Files that could not be examined or deleted.
    pub failed: usize,
    /// The first error encountered during the sweep, if any. The sweep
    /// itself never aborts early.
    pub first_error: Option<String>,
}

/// A report sink honoring the save/load/list contract.
///
/// The two capability methods have default implementations so that a
/// minimal backend is implementable in a few dozen lines; callers probe
/// for the capability by checking for `Some`.
pub trait Storage: Send + Sync {
    /// Persists a report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written durably.
    fn save(&self, report: &ForensicReport) -> Result<()>;

    /// Loads a report by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotFound`] for an unknown id.
    fn load(&self, id: &str) -> Result<ForensicReport>;

    /// Lists all readable reports. Corrupt or unreadable entries are
    /// skipped, never failing the whole listing.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend cannot be enumerated at all.
    fn list(&self) -> Result<Vec<ForensicReport>>;

    /// Saves and reports the on-disk footprint; `Ok(None)` when the
    /// backend cannot measure it (the report is still saved).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Storage::save`].
    fn save_with_result(&self, report: &ForensicReport) -> Result<Option<SaveResult>> {
        self.save(report)?;
        Ok(None)
    }

    /// Deletes reports older than `retention`; `Ok(None)` when the backend
    /// has no retention capability.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend cannot be enumerated at all.
    fn prune(&self, retention: Duration) -> Result<Option<PruneResult>> {
        let _ = retention;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podmortem_core::PodCrash;

    /// A backend implementing only the base contract.
    struct NullStore;

    impl Storage for NullStore {
        fn save(&self, _report: &ForensicReport) -> Result<()> {
            Ok(())
        }

        fn load(&self, id: &str) -> Result<ForensicReport> {
            Err(crate::StoreError::NotFound(id.to_string()))
        }

        fn list(&self) -> Result<Vec<ForensicReport>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn default_capabilities_are_absent() {
        let store = NullStore;
        let report = ForensicReport::new(PodCrash::new("prod", "api", "main"));

        let saved = store.save_with_result(&report).expect("save");
        assert!(saved.is_none());

        let pruned = store.prune(Duration::from_secs(60)).expect("prune");
        assert!(pruned.is_none());
    }
}
