//! Primary/secondary store composition.

use std::sync::Arc;
use std::time::Duration;

use podmortem_core::ForensicReport;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::storage::{PruneResult, Storage};

/// Fail-soft composition of two stores.
///
/// Saves go to both; a primary failure is fatal for the call only when the
/// secondary also failed, while a secondary-only failure is logged and
/// tolerated. Loads try the primary first, then the secondary. Listing and
/// pruning are the primary's concern.
pub struct MultiStore {
    primary: Arc<dyn Storage>,
    secondary: Arc<dyn Storage>,
}

impl MultiStore {
    /// Composes two stores.
    #[must_use]
    pub fn new(primary: Arc<dyn Storage>, secondary: Arc<dyn Storage>) -> Self {
        Self { primary, secondary }
    }
}

impl Storage for MultiStore {
    fn save(&self, report: &ForensicReport) -> Result<()> {
        let primary = self.primary.save(report);
        let secondary = self.secondary.save(report);

        match (primary, secondary) {
            (Ok(()), Ok(())) => Ok(()),
            (Ok(()), Err(e)) => {
                warn!(error = %e, "secondary store failed");
                Ok(())
            }
            (Err(p), Ok(())) => Err(StoreError::PrimaryFailed(p.to_string())),
            (Err(p), Err(s)) => Err(StoreError::BothStoresFailed {
                primary: p.to_string(),
                secondary: s.to_string(),
            }),
        }
    }

    fn load(&self, id: &str) -> Result<ForensicReport> {
        match self.primary.load(id) {
            Ok(report) => Ok(report),
            Err(_) => self.secondary.load(id),
        }
    }

    fn list(&self) -> Result<Vec<ForensicReport>> {
        self.primary.list()
    }

    fn prune(&self, retention: Duration) -> Result<Option<PruneResult>> {
        let _ = retention;
        Ok(None)
    }
}
