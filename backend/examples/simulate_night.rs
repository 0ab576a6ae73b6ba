//! Example simulating one observing night
//!
//! This example shows how to:
//! 1. Configure an observer and a dome
//! 2. Ingest a target list for the night
//! 3. Attach a static bright-star list as reference source
//! 4. Step a manual clock through the night, asking for the next target
//!    and reporting each completion
//!
//! To run this example:
//! ```bash
//! cargo run --example simulate_night
//! ```

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tokio_util::sync::CancellationToken;

use speckle_scheduler::clock::{Clock, ManualClock};
use speckle_scheduler::config::SchedulerConfig;
use speckle_scheduler::io::parse_target_str;
use speckle_scheduler::models::{Coordinates, ReferenceCandidate};
use speckle_scheduler::scheduler::TargetScheduler;
use speckle_scheduler::services::{
    AltitudeModel, BrightStarList, Ingest, ObservingNight, ReferenceMatcher,
};

const TARGETS: &str = "\
name,ra,dec,mag1,mag2,sep,color,cycles
STF 1110,07 34 35.9,+31 53 18,1.9,3.0,5.0,0.04,1
STF 1196,08 12 12.7,+17 38 53,5.3,6.2,1.1,0.45,2
STF 1523,11 18 10.9,+31 31 45,4.3,4.8,1.9,0.6,2
STF 1670,12 41 39.6,-01 26 58,3.5,3.5,3.1,0.36,1
STF 1938,15 24 29.4,+37 22 38,7.1,7.6,2.2,1.0,1
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Speckle Night Simulation ===\n");

    println!("1. Configuring the site...");
    let mut config = SchedulerConfig::default();
    config.observer.latitude = 32.0;
    config.observer.longitude = -110.0;
    config.observer.utc_offset_minutes = -7 * 60;
    config.limits.min_moon_distance = 0.0;
    let night = ObservingNight::for_date(&config, NaiveDate::from_ymd_opt(2024, 3, 1).ok_or("invalid date")?)?;
    println!(
        "   Night of {}: {} to {} UTC\n",
        night.date,
        night.window.start.format("%H:%M"),
        night.window.end.format("%H:%M")
    );

    println!("2. Ingesting targets...");
    let model = AltitudeModel::from_settings(&config.observer)?;
    let records = parse_target_str(TARGETS, "inline")?;
    let report = Ingest::new(&config, &model, night.window).run(&records);
    for target in &report.accepted {
        println!(
            "   {:<10} image time {}",
            target.name,
            target
                .image_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_default()
        );
    }
    for target in &report.rejected {
        if let Some(reason) = &target.rejection {
            println!("   {:<10} rejected: {}", target.name, reason);
        }
    }
    println!();

    println!("3. Loading reference stars...");
    let stars = BrightStarList::new(vec![
        ReferenceCandidate::new("HR 2763", Coordinates::new(113.98, 26.90), 6.2, 0.1),
        ReferenceCandidate::new("HR 3174", Coordinates::new(121.0, 18.0), 6.5, 0.5),
        ReferenceCandidate::new("HR 4375", Coordinates::new(170.5, 31.0), 6.5, 0.6),
        ReferenceCandidate::new("HR 4825", Coordinates::new(191.0, -2.5), 6.8, 0.4),
        ReferenceCandidate::new("HR 5733", Coordinates::new(230.0, 36.0), 7.2, 1.0),
    ]);
    println!("   {} stars\n", stars.len());
    let matcher = ReferenceMatcher::new(config.reference.clone()).with_source(Arc::new(stars));

    println!("4. Running the night...");
    let clock = Arc::new(ManualClock::new(night.window.start));
    let scheduler = TargetScheduler::new(
        Arc::new(config),
        clock.clone(),
        night,
        report.into_targets(),
    )
    .with_matcher(Arc::new(matcher));

    let cancel = CancellationToken::new();
    while clock.now() < night.window.end {
        match scheduler.next_target(&cancel).await {
            Some(selection) => {
                if selection.image_time > clock.now() {
                    clock.set(selection.image_time);
                }
                let plan = scheduler.plan_builder().build(&selection);
                println!(
                    "   {} {:<10} ({} tier, {} steps, reference {})",
                    clock.now().format("%H:%M"),
                    selection.target.name,
                    selection.tier,
                    plan.steps.len(),
                    selection
                        .target
                        .reference
                        .as_ref()
                        .map(|r| r.name.as_str())
                        .unwrap_or("none")
                );
                clock.advance(Duration::minutes(10));
                scheduler.register_completion()?;
            }
            None => clock.advance(Duration::minutes(15)),
        }
    }

    println!("\n5. Progress at dawn:");
    for target in scheduler.targets().iter().filter(|t| t.image_target) {
        println!(
            "   {:<10} cycles {}/{} nights {}/{}",
            target.name, target.completed_cycles, target.cycles, target.completed_nights, target.nights
        );
    }

    Ok(())
}
