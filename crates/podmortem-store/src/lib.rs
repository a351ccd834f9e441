//! # podmortem-store
//!
//! Durable, optionally compressed, crash-safe report persistence.
//!
//! This crate provides:
//!
//! - [`Storage`] — The persistence contract: `save`, `load`, `list`, plus
//!   optional capabilities (`save_with_result`, `prune`) that simple
//!   backends can leave unimplemented
//! - [`FileStore`] — Directory-backed store with atomic writes, optional
//!   gzip compression and retention pruning
//! - [`MultiStore`] — Primary/secondary fail-soft composition of two
//!   stores
//!
//! On-disk layout: one JSON document per report, named
//! `<id>_<namespace>_<pod>.json` (or `.json.gz`). The id-first prefix makes
//! lookup by id a directory scan with no index.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod file_store;
pub mod multi;
mod prune;
pub mod storage;

pub use error::{Result, StoreError};
pub use file_store::{Compression, FileStore};
pub use multi::MultiStore;
pub use storage::{PruneResult, SaveResult, Storage};
