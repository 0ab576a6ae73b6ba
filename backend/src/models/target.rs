//! The speckle target entity.
//!
//! A `Target` is created from one row of the target file, gets its altitude
//! series and nominal image time during ingest, and afterwards only has its
//! completion counters, `imaged_at` and attached reference star changed by
//! the scheduler. Targets are never removed; an unschedulable one is switched
//! off through `image_target`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::coordinates::Coordinates;
use super::reference::ReferenceCandidate;
use super::sample::{AltitudeSample, SlitWindow};
use crate::api::{TargetId, TimeWindow};

/// Why ingest marked a target as not imageable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    MissingCoordinates,
    SeparationOutOfRange { separation: f64, min: f64, max: f64 },
    MagnitudeOutOfRange { magnitude: f64, min: f64, max: f64 },
    NightsCompleted { nights: u32 },
    NotImageableTonight,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCoordinates => write!(f, "coordinates missing"),
            Self::SeparationOutOfRange {
                separation,
                min,
                max,
            } => write!(
                f,
                "separation {:.2}\" out of range [{}, {}]",
                separation, min, max
            ),
            Self::MagnitudeOutOfRange { magnitude, min, max } => write!(
                f,
                "magnitude {:.2} out of range [{}, {}]",
                magnitude, min, max
            ),
            Self::NightsCompleted { nights } => {
                write!(f, "all {} requested nights completed", nights)
            }
            Self::NotImageableTonight => write!(f, "cannot be imaged tonight"),
        }
    }
}

/// A close double star scheduled for speckle imaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,

    // Catalog
    pub name: String,
    pub coordinates: Coordinates,
    pub magnitude_1: f64,
    pub magnitude_2: f64,
    /// Separation of the pair in arcseconds (0 when unknown)
    pub separation_arcsec: f64,
    /// B-V color index when the catalog provides one
    pub color_index: Option<f64>,
    pub filter: String,
    pub exposure_time_secs: f64,
    pub exposure_count: u32,
    pub rotation_deg: f64,

    // Scheduling
    pub nights: u32,
    pub cycles: u32,
    pub completed_nights: u32,
    pub completed_cycles: u32,
    pub completed_reference_cycles: u32,
    pub priority: f64,
    pub min_altitude_deg: f64,
    pub airmass_min: f64,
    pub airmass_max: f64,
    pub image_target: bool,
    /// Count an observation of this target toward completion
    pub register: bool,
    pub get_reference: bool,
    pub template: String,
    pub reference_template: String,
    pub imaged_at: Option<DateTime<Utc>>,

    // Derived during ingest
    #[serde(skip)]
    pub altitude_series: Vec<AltitudeSample>,
    #[serde(skip)]
    pub slit_series: Vec<AltitudeSample>,
    pub slit_window: Option<SlitWindow>,
    pub image_time: Option<DateTime<Utc>>,
    pub image_altitude_deg: Option<f64>,
    pub rejection: Option<RejectionReason>,

    // Reference star
    pub reference: Option<ReferenceCandidate>,
    #[serde(skip)]
    pub reference_candidates: Vec<ReferenceCandidate>,
}

impl Target {
    /// New target with a fresh id and neutral scheduling fields.
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            id: TargetId::next(),
            name: name.into(),
            coordinates,
            magnitude_1: 0.0,
            magnitude_2: 0.0,
            separation_arcsec: 0.0,
            color_index: None,
            filter: String::new(),
            exposure_time_secs: 0.0,
            exposure_count: 0,
            rotation_deg: 0.0,
            nights: 1,
            cycles: 1,
            completed_nights: 0,
            completed_cycles: 0,
            completed_reference_cycles: 0,
            priority: 0.0,
            min_altitude_deg: 0.0,
            airmass_min: 0.0,
            airmass_max: 4.0,
            image_target: true,
            register: true,
            get_reference: true,
            template: String::new(),
            reference_template: String::new(),
            imaged_at: None,
            altitude_series: Vec::new(),
            slit_series: Vec::new(),
            slit_window: None,
            image_time: None,
            image_altitude_deg: None,
            rejection: None,
            reference: None,
            reference_candidates: Vec::new(),
        }
    }

    /// Brighter of the two component magnitudes (unset magnitudes are 0 and ignored).
    pub fn primary_magnitude(&self) -> f64 {
        match (self.magnitude_1 > 0.0, self.magnitude_2 > 0.0) {
            (true, true) => self.magnitude_1.min(self.magnitude_2),
            (true, false) => self.magnitude_1,
            (false, true) => self.magnitude_2,
            (false, false) => 0.0,
        }
    }

    /// Fainter of the two component magnitudes.
    pub fn secondary_magnitude(&self) -> f64 {
        self.magnitude_1.max(self.magnitude_2)
    }

    /// Mark not imageable, keeping the record.
    pub fn reject(&mut self, reason: RejectionReason) {
        self.image_target = false;
        self.rejection = Some(reason);
    }

    /// Imageable, with nights and cycles left to do.
    pub fn has_work_left(&self) -> bool {
        self.image_target && self.nights > self.completed_nights && self.cycles > self.completed_cycles
    }

    /// Wanted by the target list. Ingest rejections are evaluated again every
    /// night; only a target switched off in the list itself stays off.
    pub fn enabled(&self) -> bool {
        self.image_target || self.rejection.is_some()
    }

    /// Open a new observing night.
    ///
    /// A cycle quota met on an earlier night starts over while requested
    /// nights remain. A completion inside `night` means the list is being
    /// reloaded mid-night, so the counter is kept. Returns whether it was
    /// reset.
    pub fn start_night(&mut self, night: &TimeWindow) -> bool {
        let quota_met = self.completed_cycles >= self.cycles;
        let imaged_tonight = self.imaged_at.is_some_and(|t| night.contains(t));
        if quota_met && self.completed_nights < self.nights && !imaged_tonight {
            self.completed_cycles = 0;
            true
        } else {
            false
        }
    }

    /// Imaged less than `cooldown` before `now`.
    pub fn imaged_within(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.imaged_at
            .map(|t| now - t < cooldown && now >= t)
            .unwrap_or(false)
    }

    /// Apply one finished observation slot.
    ///
    /// Only registering targets count: `imaged_at` becomes `now`, one cycle
    /// is added, and reaching the cycle quota completes the night. Returns
    /// whether anything changed.
    pub fn record_observation(&mut self, now: DateTime<Utc>) -> bool {
        if !self.register {
            return false;
        }
        self.imaged_at = Some(now);
        self.completed_cycles += 1;
        if self.completed_cycles == self.cycles {
            self.completed_nights += 1;
        }
        true
    }
}
