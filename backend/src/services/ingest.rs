//! Target ingest: acceptance rules, visibility series and night ordering.
//!
//! Each raw record becomes a `Target`. Records that break an acceptance
//! rule are kept but switched off with a `RejectionReason`; the rest get an
//! altitude series over the (margin-extended) night, a dome-slit window and
//! an image time. Series are computed in parallel, one target per task.

use chrono::Duration;
use log::{debug, info};
use rayon::prelude::*;
use std::cmp::Ordering;

use crate::api::TimeWindow;
use crate::config::{SchedulerConfig, TargetDefaults};
use crate::io::TargetRecord;
use crate::models::{Coordinates, RejectionReason, Target};
use crate::services::altitude::AltitudeModel;
use crate::services::visibility::VisibilityRules;

/// Outcome of ingesting one target list.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Imageable targets in night order
    pub accepted: Vec<Target>,
    /// Switched-off targets, in input order. Those rejected by ingest carry
    /// their reason; those switched off in the target list carry none.
    pub rejected: Vec<Target>,
}

impl IngestReport {
    /// Every target, accepted ones first.
    pub fn into_targets(self) -> Vec<Target> {
        let mut all = self.accepted;
        all.extend(self.rejected);
        all
    }

    pub fn len(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}

/// Build a target from a record, filling unset fields from `defaults`.
pub fn target_from_record(record: &TargetRecord, defaults: &TargetDefaults) -> Target {
    let coordinates = record
        .coordinates
        .unwrap_or_else(|| Coordinates::new(0.0, 0.0));
    let mut target = Target::new(record.name.clone(), coordinates);

    target.magnitude_1 = record.magnitude_1.unwrap_or(0.0);
    target.magnitude_2 = record.magnitude_2.unwrap_or(0.0);
    target.separation_arcsec = record.separation_arcsec.unwrap_or(0.0);
    target.color_index = record.color_index;
    target.filter = record.filter.clone().unwrap_or_else(|| defaults.filter.clone());
    target.exposure_time_secs = record
        .exposure_time_secs
        .unwrap_or(defaults.exposure_time_secs);
    target.exposure_count = record.exposure_count.unwrap_or(defaults.exposure_count);
    target.rotation_deg = record.rotation_deg.unwrap_or(0.0);

    // zero requested nights/cycles means "not set"
    target.nights = record.nights.filter(|n| *n > 0).unwrap_or(defaults.nights);
    target.cycles = record.cycles.filter(|c| *c > 0).unwrap_or(defaults.cycles);
    target.completed_nights = record.completed_nights.unwrap_or(0);
    target.completed_cycles = record.completed_cycles.unwrap_or(0);
    target.completed_reference_cycles = record.completed_reference_cycles.unwrap_or(0);
    target.imaged_at = record.imaged_at;
    target.priority = record.priority.unwrap_or(0.0);
    target.min_altitude_deg = record.min_altitude_deg.unwrap_or(defaults.min_altitude);
    target.airmass_min = record.airmass_min.unwrap_or(defaults.airmass_min);
    target.airmass_max = record.airmass_max.unwrap_or(defaults.airmass_max);
    target.image_target = record.image_target.unwrap_or(true);
    target.register = record.register.unwrap_or(true);
    target.get_reference = record.get_reference.unwrap_or(defaults.get_reference);
    target.template = record
        .template
        .clone()
        .unwrap_or_else(|| defaults.template.clone());
    target.reference_template = record
        .reference_template
        .clone()
        .unwrap_or_else(|| defaults.reference_template.clone());
    target
}

/// First catalog rule the target breaks, if any.
pub fn catalog_rejection(target: &Target, config: &SchedulerConfig) -> Option<RejectionReason> {
    let limits = &config.limits;
    if target.coordinates.is_missing() {
        return Some(RejectionReason::MissingCoordinates);
    }
    let separation = target.separation_arcsec;
    if separation > 0.0 && !(limits.min_separation..=limits.max_separation).contains(&separation)
    {
        return Some(RejectionReason::SeparationOutOfRange {
            separation,
            min: limits.min_separation,
            max: limits.max_separation,
        });
    }
    let magnitude = target.primary_magnitude();
    if magnitude > 0.0 && !(limits.min_magnitude..=limits.max_magnitude).contains(&magnitude) {
        return Some(RejectionReason::MagnitudeOutOfRange {
            magnitude,
            min: limits.min_magnitude,
            max: limits.max_magnitude,
        });
    }
    if target.completed_nights >= target.nights {
        return Some(RejectionReason::NightsCompleted {
            nights: target.nights,
        });
    }
    None
}

/// Night order: image time ascending, then priority and altitude descending.
pub fn night_order(a: &Target, b: &Target) -> Ordering {
    a.image_time
        .cmp(&b.image_time)
        .then_with(|| b.priority.total_cmp(&a.priority))
        .then_with(|| {
            let alt_a = a.image_altitude_deg.unwrap_or(f64::NEG_INFINITY);
            let alt_b = b.image_altitude_deg.unwrap_or(f64::NEG_INFINITY);
            alt_b.total_cmp(&alt_a)
        })
}

/// Computes visibility for batches of targets over one night.
#[derive(Debug, Clone)]
pub struct Ingest<'a> {
    config: &'a SchedulerConfig,
    model: &'a AltitudeModel,
    rules: VisibilityRules,
}

impl<'a> Ingest<'a> {
    pub fn new(config: &'a SchedulerConfig, model: &'a AltitudeModel, night: TimeWindow) -> Self {
        Self {
            config,
            model,
            rules: VisibilityRules::from_config(config, night),
        }
    }

    pub fn rules(&self) -> &VisibilityRules {
        &self.rules
    }

    /// Ingest raw records.
    pub fn run(&self, records: &[TargetRecord]) -> IngestReport {
        let targets = records
            .iter()
            .map(|r| target_from_record(r, &self.config.defaults))
            .collect();
        self.run_targets(targets)
    }

    /// Ingest already-built targets (e.g. a filler list).
    ///
    /// Targets switched off in the list are passed through untouched. The
    /// others start tonight's cycles before the acceptance rules run.
    pub fn run_targets(&self, targets: Vec<Target>) -> IngestReport {
        let margin = Duration::minutes(self.config.night.margin_minutes);
        let window = self.rules.night.extended(margin);
        let mut candidates = Vec::with_capacity(targets.len());
        let mut rejected = Vec::new();
        for mut target in targets {
            if !target.image_target {
                debug!("Skipping '{}': switched off in the target list", target.name);
                rejected.push(target);
                continue;
            }
            if target.start_night(&window) {
                debug!(
                    "'{}': new night {}/{}, cycle count reset",
                    target.name,
                    target.completed_nights + 1,
                    target.nights
                );
            }
            match catalog_rejection(&target, self.config) {
                Some(reason) => {
                    debug!("Rejected '{}': {}", target.name, reason);
                    target.reject(reason);
                    rejected.push(target);
                }
                None => candidates.push(target),
            }
        }

        let step_hours = self.config.dome.step_hours();
        let grid = self.model.grid(&window, step_hours);
        let step = grid.step();

        let evaluated: Vec<(Target, bool)> = candidates
            .into_par_iter()
            .map(|mut target| {
                target.altitude_series = self
                    .model
                    .series_on_grid(&target.coordinates, &grid)
                    .into_iter()
                    .filter(|s| s.is_finite())
                    .collect();
                let imageable = self.rules.evaluate(&mut target, step);
                (target, imageable)
            })
            .collect();

        let mut accepted = Vec::with_capacity(evaluated.len());
        for (mut target, imageable) in evaluated {
            if imageable {
                accepted.push(target);
            } else {
                let reason = RejectionReason::NotImageableTonight;
                debug!("Rejected '{}': {}", target.name, reason);
                target.reject(reason);
                rejected.push(target);
            }
        }
        accepted.sort_by(night_order);

        info!(
            "Ingested {} targets: {} imageable, {} rejected",
            accepted.len() + rejected.len(),
            accepted.len(),
            rejected.len()
        );
        IngestReport { accepted, rejected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::GeographicLocation;
    use chrono::{TimeZone, Utc};

    fn record(name: &str, ra: f64, dec: f64) -> TargetRecord {
        TargetRecord {
            name: name.to_string(),
            coordinates: Some(Coordinates::new(ra, dec)),
            ..Default::default()
        }
    }

    fn night() -> TimeWindow {
        // Tucson, 2024-03-01 evening to 2024-03-02 morning (UTC)
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 12, 30, 0).unwrap(),
        )
        .unwrap()
    }

    fn model() -> AltitudeModel {
        AltitudeModel::new(GeographicLocation::new(32.0, -110.0, None).unwrap())
    }

    #[test]
    fn test_defaults_fill_unset_fields() {
        let defaults = TargetDefaults::default();
        let mut r = record("A", 10.0, 20.0);
        r.cycles = Some(0);
        r.min_altitude_deg = Some(45.0);
        let target = target_from_record(&r, &defaults);
        assert_eq!(target.cycles, defaults.cycles);
        assert_eq!(target.nights, defaults.nights);
        assert_eq!(target.min_altitude_deg, 45.0);
        assert_eq!(target.template, defaults.template);
        assert_eq!(target.airmass_max, 4.0);
        assert!(target.get_reference);
    }

    #[test]
    fn test_catalog_rejections_are_distinguishable() {
        let config = SchedulerConfig::default();
        let defaults = &config.defaults;

        let missing = target_from_record(&record("zero", 0.0, 0.0), defaults);
        assert_eq!(
            catalog_rejection(&missing, &config),
            Some(RejectionReason::MissingCoordinates)
        );

        let mut wide = target_from_record(&record("wide", 10.0, 20.0), defaults);
        wide.separation_arcsec = 25.0;
        assert!(matches!(
            catalog_rejection(&wide, &config),
            Some(RejectionReason::SeparationOutOfRange { .. })
        ));

        let mut faint = target_from_record(&record("faint", 10.0, 20.0), defaults);
        faint.magnitude_1 = 14.0;
        assert!(matches!(
            catalog_rejection(&faint, &config),
            Some(RejectionReason::MagnitudeOutOfRange { .. })
        ));

        let mut done = target_from_record(&record("done", 10.0, 20.0), defaults);
        done.completed_nights = done.nights;
        assert!(matches!(
            catalog_rejection(&done, &config),
            Some(RejectionReason::NightsCompleted { .. })
        ));

        // unknown separation and magnitude are not checked
        let unknown = target_from_record(&record("unknown", 10.0, 20.0), defaults);
        assert_eq!(catalog_rejection(&unknown, &config), None);
    }

    #[test]
    fn test_run_rejects_unobservable_and_keeps_records() {
        let config = SchedulerConfig::default();
        let model = model();
        let ingest = Ingest::new(&config, &model, night());
        let records = vec![
            record("spring", 165.0, 30.0),
            record("south pole", 100.0, -80.0),
            record("empty", 0.0, 0.0),
        ];
        let report = ingest.run(&records);
        assert_eq!(report.len(), 3);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].name, "spring");
        assert!(report.accepted[0].image_time.is_some());
        assert!(!report.accepted[0].altitude_series.is_empty());

        let south = report
            .rejected
            .iter()
            .find(|t| t.name == "south pole")
            .unwrap();
        assert!(!south.image_target);
        assert_eq!(south.rejection, Some(RejectionReason::NotImageableTonight));
        assert_eq!(
            south.rejection.as_ref().unwrap().to_string(),
            "cannot be imaged tonight"
        );
    }

    #[test]
    fn test_accepted_targets_are_in_night_order() {
        let config = SchedulerConfig::default();
        let model = model();
        let ingest = Ingest::new(&config, &model, night());
        let records: Vec<TargetRecord> = [120.0, 200.0, 150.0, 150.0]
            .iter()
            .enumerate()
            .map(|(i, ra)| {
                let mut r = record(&format!("T{}", i), *ra, 30.0);
                r.priority = Some(i as f64);
                r
            })
            .collect();
        let report = ingest.run(&records);
        assert_eq!(report.accepted.len(), 4);
        for pair in report.accepted.windows(2) {
            assert_ne!(night_order(&pair[0], &pair[1]), Ordering::Greater);
        }
        // equal image time: higher priority first
        let same: Vec<&Target> = report
            .accepted
            .iter()
            .filter(|t| t.coordinates.ra_deg == 150.0)
            .collect();
        assert_eq!(same[0].name, "T3");
    }

    #[test]
    fn test_next_night_restarts_cycles() {
        let config = SchedulerConfig::default();
        let model = model();
        let ingest = Ingest::new(&config, &model, night());
        let previous = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

        let mut second_night = record("spring", 165.0, 30.0);
        second_night.nights = Some(2);
        second_night.cycles = Some(2);
        second_night.completed_nights = Some(1);
        second_night.completed_cycles = Some(2);
        second_night.imaged_at = Some(previous);

        let mut restarted = second_night.clone();
        restarted.name = "restarted".to_string();
        restarted.imaged_at = Some(Utc.with_ymd_and_hms(2024, 3, 2, 6, 0, 0).unwrap());

        let mut off = record("off", 165.0, 30.0);
        off.image_target = Some(false);

        let report = ingest.run(&[second_night, restarted, off]);
        let spring = report.accepted.iter().find(|t| t.name == "spring").unwrap();
        assert_eq!(spring.completed_cycles, 0);
        assert_eq!(spring.imaged_at, Some(previous));
        assert!(spring.has_work_left());

        let restarted = report.accepted.iter().find(|t| t.name == "restarted").unwrap();
        assert_eq!(restarted.completed_cycles, 2);
        assert!(!restarted.has_work_left());

        let off = report.rejected.iter().find(|t| t.name == "off").unwrap();
        assert!(off.rejection.is_none());
        assert!(off.altitude_series.is_empty());
        assert!(!off.enabled());
    }

    #[test]
    fn test_night_order_ties() {
        let t = Utc.with_ymd_and_hms(2024, 3, 2, 5, 0, 0).unwrap();
        let mut a = Target::new("a", Coordinates::new(1.0, 1.0));
        let mut b = Target::new("b", Coordinates::new(2.0, 2.0));
        a.image_time = Some(t);
        b.image_time = Some(t);
        a.image_altitude_deg = Some(50.0);
        b.image_altitude_deg = Some(60.0);
        assert_eq!(night_order(&a, &b), Ordering::Greater);
        a.priority = 1.0;
        assert_eq!(night_order(&a, &b), Ordering::Less);
    }
}
