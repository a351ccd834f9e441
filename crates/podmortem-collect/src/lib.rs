//! # podmortem-collect
//!
//! Volatile evidence collection for detected pod crashes.
//!
//! This crate provides:
//!
//! - [`PodApi`] — The read-only cluster surface the collectors pull from
//! - [`LogCollector`] / [`EventCollector`] / [`EnvCollector`] — One
//!   collector per evidence source
//! - [`Collector`] — Composes a [`podmortem_core::ForensicReport`] from
//!   parallel source calls, degrading gracefully when sources fail
//!
//! The collector races the control plane: crash evidence (especially
//! previous-incarnation logs) disappears on restart, so every source is
//! fetched concurrently under its own deadline and a failed source becomes
//! a report warning instead of a failed report.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod collector;
pub mod env;
pub mod error;
pub mod events;
pub mod logs;

pub use api::{ClusterEvent, FieldSelector, LogOptions, PodApi};
pub use collector::Collector;
pub use env::EnvCollector;
pub use error::{CollectError, Result};
pub use events::EventCollector;
pub use logs::LogCollector;
