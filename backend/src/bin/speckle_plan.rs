//! Night planner binary
//!
//! Loads a configuration and a target list, computes tonight's visibility
//! and prints the imageable targets in night order as JSON.
//!
//! # Usage
//!
//! ```bash
//! speckle-plan speckle.toml targets.csv
//! speckle-plan speckle.toml targets.csv 2024-03-01
//! ```
//!
//! The optional third argument names the observing night; by default the
//! night containing the current time is planned.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use std::env;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use speckle_scheduler::config::SchedulerConfig;
use speckle_scheduler::io::parse_target_file;
use speckle_scheduler::services::{AltitudeModel, Ingest, ObservingNight};

#[derive(Debug, Serialize)]
struct PlanEntry {
    name: String,
    ra: String,
    dec: String,
    image_time: Option<DateTime<Utc>>,
    altitude_deg: Option<f64>,
    slit_start: Option<DateTime<Utc>>,
    slit_end: Option<DateTime<Utc>>,
    priority: f64,
    reference: bool,
}

#[derive(Debug, Serialize)]
struct NightPlan {
    night: NaiveDate,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rejected: usize,
    targets: Vec<PlanEntry>,
}

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (config_path, targets_path, date) = match args.as_slice() {
        [config, targets] => (config, targets, None),
        [config, targets, date] => (
            config,
            targets,
            Some(
                NaiveDate::parse_from_str(date, "%Y-%m-%d")
                    .with_context(|| format!("Invalid night date '{}'", date))?,
            ),
        ),
        _ => bail!("usage: speckle-plan <config.toml> <targets> [YYYY-MM-DD]"),
    };

    let config = SchedulerConfig::from_file(config_path)?;
    let night = match date {
        Some(date) => ObservingNight::for_date(&config, date)?,
        None => ObservingNight::containing(&config, Utc::now())?,
    };
    info!(
        "Night of {}: {} to {}",
        night.date,
        night.window.start.format("%H:%M"),
        night.window.end.format("%H:%M")
    );

    let model = AltitudeModel::from_settings(&config.observer)?;
    let records = parse_target_file(targets_path)?;
    let report = Ingest::new(&config, &model, night.window).run(&records);

    for target in &report.rejected {
        if let Some(reason) = &target.rejection {
            warn!("{}: {}", target.name, reason);
        }
    }

    let plan = NightPlan {
        night: night.date,
        start: night.window.start,
        end: night.window.end,
        rejected: report.rejected.len(),
        targets: report
            .accepted
            .iter()
            .map(|t| PlanEntry {
                name: t.name.clone(),
                ra: t.coordinates.ra_hms(),
                dec: t.coordinates.dec_dms(),
                image_time: t.image_time,
                altitude_deg: t.image_altitude_deg,
                slit_start: t.slit_window.map(|w| w.start),
                slit_end: t.slit_window.map(|w| w.end()),
                priority: t.priority,
                reference: t.get_reference,
            })
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
