//! # podmortem-watch
//!
//! Differential crash detection over a pod informer stream.
//!
//! This crate provides:
//!
//! - [`InformerSource`] — Abstract cache-backed pod watch delivering
//!   add/update/delete callbacks as a [`PodUpdate`] stream
//! - [`CrashHandler`] — Callback invoked for each novel crash
//! - [`Watcher`] — The detector: pairwise old/new container status
//!   comparison, reason allowlist, dedup window, periodic dedup sweep
//! - [`WatcherConfig`] — Namespace filter, allowed reasons, dedup TTL
//!
//! A production [`InformerSource`] wraps the cluster client's shared
//! informer; tests inject a synthetic source backed by a channel, which is
//! enough to exercise the whole detector without a live cluster.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod source;
pub mod watcher;

pub use error::{Result, WatchError};
pub use source::{CrashHandler, InformerSource, PodUpdate};
pub use watcher::{Watcher, WatcherConfig};
