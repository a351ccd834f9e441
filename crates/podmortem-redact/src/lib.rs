//! # podmortem-redact
//!
//! In-place secret redaction for forensic reports.
//!
//! This crate provides:
//!
//! - [`RedactionConfig`] — Policy: env allow/deny globs, log regex rules,
//!   replacement token, from-source handling
//! - [`Redactor`] — Applies the policy to a report before it reaches any
//!   sink
//!
//! Redaction runs after collection and before persistence or notification;
//! it is the only mutation a report sees after the collector returns, and
//! applying it twice equals applying it once.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod glob;
pub mod redactor;

pub use error::{RedactError, Result};
pub use redactor::{RedactionConfig, Redactor};
