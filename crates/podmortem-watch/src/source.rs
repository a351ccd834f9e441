//! The informer seam: pod update delivery and the crash callback.

use async_trait::async_trait;
use podmortem_core::{PodCrash, PodSnapshot};
use tokio::sync::mpsc;

use crate::error::Result;

/// One informer callback, as delivered by the watch cache.
#[derive(Debug, Clone)]
pub enum PodUpdate {
    /// A pod entered the cache. For pods that crashed while the observer
    /// was offline, this is where the missed crash is replayed.
    Added(PodSnapshot),
    /// A pod changed; carries both sides of the transition.
    Updated {
        /// The previously cached snapshot.
        old: PodSnapshot,
        /// The incoming snapshot.
        new: PodSnapshot,
    },
    /// A pod left the cache. Ignored by the detector.
    Deleted(PodSnapshot),
}

/// A cache-backed watch over pod objects.
///
/// `start` must complete the initial cache synchronization before
/// returning; a sync failure is fatal and surfaces as an error. Updates
/// for a single pod arrive in control-plane order on the returned channel.
#[async_trait]
pub trait InformerSource: Send + Sync {
    /// Starts the watch and returns the update stream.
    ///
    /// # Errors
    ///
    /// Returns [`crate::WatchError::SyncFailed`] if the cache cannot be
    /// synchronized.
    async fn start(&self) -> Result<mpsc::Receiver<PodUpdate>>;
}

/// Callback invoked for each detected crash that passes dedup.
///
/// Invocation is synchronous on the watch path: a slow handler slows
/// detection for the same pod, which couples pipeline depth to the source
/// instead of growing an unbounded queue.
#[async_trait]
pub trait CrashHandler: Send + Sync {
    /// Handles one crash.
    async fn handle_crash(&self, crash: PodCrash);
}
