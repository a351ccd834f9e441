//! # podmortem-core
//!
//! Domain types for the podmortem crash forensics observer.
//!
//! This crate provides:
//!
//! - [`PodCrash`] — A single detected container crash
//! - [`Event`] — A cluster event associated with a pod
//! - [`ForensicReport`] — The aggregate forensic artifact built per crash
//! - [`PodSnapshot`] / [`ContainerStatus`] — Pod status snapshots as seen by
//!   the watcher
//! - [`PodSpec`] / [`EnvValue`] — The declared container environment as seen
//!   by the collector
//!
//! ## Example
//!
//! ```rust
//! use podmortem_core::{ForensicReport, PodCrash};
//!
//! let crash = PodCrash::new("prod", "api-7d4b", "main");
//! let report = ForensicReport::new(crash);
//!
//! assert_eq!(report.id.len(), 16);
//! assert_eq!(report.summary(), "prod/api-7d4b - ");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod event;
pub mod pod;
pub mod report;

pub use crash::PodCrash;
pub use event::Event;
pub use pod::{
    ContainerSpec, ContainerState, ContainerStatus, EnvSource, EnvValue, EnvVarSpec, PodSnapshot,
    PodSpec, TerminatedState,
};
pub use report::{ForensicReport, FROM_SOURCE};
