//! Network device configuration compliance.
//!
//! Compares a device's actual (backup) configuration against its intended
//! configuration, one feature at a time, and synthesizes the commands that
//! bring the device back in line.
//!
//! # Architecture
//!
//! ## Evaluation
//!
//! - [`model`]: rules, devices, payloads, results and records
//! - [`engine`]: CLI, JSON and XML compliance engines behind one trait
//! - [`dispatch`]: resolves rules to engines once and evaluates records
//! - [`batch`]: parallel evaluation with per-record failure isolation
//!
//! ## Remediation
//!
//! - [`remediation`]: hierarchical remediation and its per-OS rule profiles
//! - [`extension`]: named custom compliance and remediation functions
//!
//! ## Configuration
//!
//! - [`settings`]: TOML settings (rules, remediation, sanitization, batch)
//! - [`platform`]: driver to parser profile and remediation OS mappings
//! - [`sanitize`]: line removal and replacement applied to backups
//!
//! ## Output
//!
//! - [`plan`]: per-device config sets built from records
//! - [`report`]: terminal rendering
//! - [`logging`]: tracing subscriber setup for the binary
//!
//! # Examples
//!
//! ```ignore
//! use golden_compliance::dispatch::{Dispatcher, EvaluationJob};
//! use golden_compliance::model::Device;
//! use golden_compliance::platform::PlatformTable;
//! use golden_compliance::settings::Settings;
//!
//! let settings = Settings::load("settings.toml".as_ref())?;
//! let dispatcher = Dispatcher::from_settings(&settings, PlatformTable::builtin())?;
//! let record = dispatcher.evaluate(&EvaluationJob {
//!     device: Device::new("edge-01", "cisco_ios"),
//!     feature: "ntp".to_string(),
//!     actual: running.into(),
//!     intended: intended.into(),
//! })?;
//! println!("{} compliant={}", record.rule, record.result.compliance);
//! ```
//!
//! # Built on config-diff-core
//!
//! Parsing and diffing of CLI, XML and JSON documents live in
//! `config-diff-core`; this crate holds the compliance semantics.

pub mod batch;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod extension;
pub mod logging;
pub mod model;
pub mod plan;
pub mod platform;
pub mod remediation;
pub mod report;
pub mod sanitize;
pub mod settings;
