//! # Speckle Scheduler
//!
//! Target scheduling engine for speckle interferometry of double stars.
//!
//! Given an observer location, a dome configuration and a list of double
//! stars, the engine works out which targets can be imaged tonight, when
//! each one should be imaged, and which nearby single star serves as its
//! speckle reference. During the night it answers "what next?" and records
//! completed observations so progress carries over to the next night.
//!
//! ## Features
//!
//! - **Target Lists**: Read delimited target files (CSV, TSV, semicolon or pipe separated)
//! - **Night Window**: Twilight-to-twilight interval for the observing site
//! - **Visibility**: Altitude, airmass, Moon distance and dome-slit windows on a shared time grid
//! - **Reference Stars**: Color and distance ranking over pluggable star catalogs
//! - **Selection**: Tiered "next target" decision with completion bookkeeping
//! - **Snapshots**: Per-night progress files that read back as target lists
//!
//! ## Architecture
//!
//! - [`api`]: Identifiers, locations and time windows shared across modules
//! - [`models`]: Targets, coordinates, altitude samples and reference candidates
//! - [`services`]: Night window, altitude model, visibility rules, ingest and reference search
//! - [`scheduler`]: Selector state, the "next target" decision and execution plans
//! - [`io`]: Target file parsing and night snapshots
//! - [`config`]: TOML configuration
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use speckle_scheduler::clock::SystemClock;
//! use speckle_scheduler::config::SchedulerConfig;
//! use speckle_scheduler::io::parse_target_file;
//! use speckle_scheduler::scheduler::TargetScheduler;
//! use speckle_scheduler::services::{AltitudeModel, Ingest, ObservingNight};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SchedulerConfig::from_file("speckle.toml")?;
//! let night = ObservingNight::containing(&config, chrono::Utc::now())?;
//! let model = AltitudeModel::from_settings(&config.observer)?;
//! let records = parse_target_file("targets.csv")?;
//! let report = Ingest::new(&config, &model, night.window).run(&records);
//!
//! let scheduler = TargetScheduler::new(
//!     Arc::new(config),
//!     Arc::new(SystemClock),
//!     night,
//!     report.into_targets(),
//! );
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod scheduler;
pub mod services;

pub use error::{SchedulerError, SchedulerResult};
