//! # podmortem-daemon
//!
//! The podmortem daemon: orchestrates watcher → collector → redactor →
//! notifiers → store, and exposes the HTTP surface (health, metrics,
//! reports API).
//!
//! This crate provides:
//!
//! - [`DaemonConfig`] — File- and environment-driven configuration
//! - [`DaemonMetrics`] — The Prometheus registry handle
//! - [`CrashPipeline`] — The crash handler invoked by the watcher
//! - [`Daemon`] — Task orchestration: HTTP server, watcher, prune loop,
//!   graceful shutdown
//! - [`demo`] — A synthetic cluster backend for trying the full pipeline
//!   without a cluster
//!
//! The cluster itself is an injection point: the daemon consumes any
//! [`podmortem_watch::InformerSource`] and [`podmortem_collect::PodApi`],
//! so a production build wires the cluster client's shared informer in,
//! while tests and the demo backend drive the identical pipeline.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod demo;
pub mod error;
pub mod metrics;
pub mod pipeline;

pub use api::{build_router, ApiState, ReportSummary};
pub use config::{ApiConfig, DaemonConfig, ReportsConfig, WatchConfig};
pub use daemon::{Daemon, DaemonOptions};
pub use error::{DaemonError, Result};
pub use metrics::DaemonMetrics;
pub use pipeline::CrashPipeline;
