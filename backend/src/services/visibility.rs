//! Dome-slit windowing and image time selection.
//!
//! Works on a target's altitude series: keeps the samples usable through
//! the dome slit inside the night window, derives the slit entry time and
//! dwell, and picks the nominal image time for the night.

use chrono::{DateTime, Duration, Utc};

use crate::api::TimeWindow;
use crate::config::SchedulerConfig;
use crate::models::time::round_up_to_minutes;
use crate::models::{highest_sample, AltitudeSample, SlitWindow, Target};
use crate::services::altitude::normalize_signed;

/// Per-sample acceptance limits of one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleLimits {
    pub min_altitude: f64,
    pub max_altitude: f64,
    pub airmass_min: f64,
    pub airmass_max: f64,
}

impl SampleLimits {
    pub fn for_target(target: &Target, max_altitude: f64) -> Self {
        Self {
            min_altitude: target.min_altitude_deg,
            max_altitude,
            airmass_min: target.airmass_min,
            airmass_max: target.airmass_max,
        }
    }

    pub fn accepts(&self, sample: &AltitudeSample) -> bool {
        sample.is_finite()
            && sample.altitude_deg >= self.min_altitude
            && sample.altitude_deg <= self.max_altitude
            && sample.airmass >= self.airmass_min
            && sample.airmass <= self.airmass_max
    }
}

/// Night-wide visibility rules derived from the configuration.
#[derive(Debug, Clone)]
pub struct VisibilityRules {
    pub night: TimeWindow,
    pub dome_azimuth: f64,
    pub slit_width: f64,
    pub dome_locked: bool,
    pub max_altitude: f64,
    pub min_moon_distance: f64,
    pub meridian_margin: f64,
    pub rounding_minutes: u32,
}

impl VisibilityRules {
    pub fn from_config(config: &SchedulerConfig, night: TimeWindow) -> Self {
        Self {
            night,
            dome_azimuth: config.dome.azimuth,
            slit_width: config.dome.slit_width,
            dome_locked: config.dome.locked,
            max_altitude: config.limits.max_altitude,
            min_moon_distance: config.limits.min_moon_distance,
            meridian_margin: config.limits.meridian_margin,
            rounding_minutes: config.scheduler.image_time_rounding_minutes,
        }
    }

    /// Azimuth within half a slit width of the dome azimuth, across north too.
    pub fn in_slit(&self, azimuth_deg: f64) -> bool {
        normalize_signed(azimuth_deg - self.dome_azimuth).abs() <= self.slit_width / 2.0
    }

    /// Samples observable through the slit during the night.
    ///
    /// With the dome free the slit follows the target, so only the
    /// altitude, airmass and night limits apply.
    pub fn slit_series(&self, series: &[AltitudeSample], limits: &SampleLimits) -> Vec<AltitudeSample> {
        series
            .iter()
            .filter(|s| self.night.contains(s.timestamp))
            .filter(|s| limits.accepts(s))
            .filter(|s| !self.dome_locked || self.in_slit(s.azimuth_deg))
            .copied()
            .collect()
    }

    /// Nominal image time and the altitude there.
    ///
    /// Dome locked: the slit entry time. Dome free: the highest sample that
    /// also respects the Moon distance and the meridian margin.
    pub fn image_time(
        &self,
        slit_series: &[AltitudeSample],
        slit_window: Option<&SlitWindow>,
    ) -> Option<(DateTime<Utc>, f64)> {
        let best = if self.dome_locked {
            let window = slit_window?;
            slit_series.iter().find(|s| s.timestamp == window.start).copied()
        } else {
            let candidates: Vec<AltitudeSample> = slit_series
                .iter()
                .filter(|s| s.moon_separation_deg >= self.min_moon_distance)
                .filter(|s| s.hour_angle_deg.abs() >= self.meridian_margin)
                .copied()
                .collect();
            highest_sample(&candidates).copied()
        }?;
        // rounding must not carry the image time past the end of the night
        let rounded = round_up_to_minutes(best.timestamp, self.rounding_minutes);
        let time = if self.night.contains(rounded) {
            rounded
        } else {
            best.timestamp
        };
        Some((time, best.altitude_deg))
    }

    /// Fill a target's slit series, slit window and image time from its
    /// altitude series. Returns whether an image time exists tonight.
    pub fn evaluate(&self, target: &mut Target, step: Duration) -> bool {
        let limits = SampleLimits::for_target(target, self.max_altitude);
        let slit_series = self.slit_series(&target.altitude_series, &limits);
        let slit_window = SlitWindow::from_samples(&slit_series, step);
        let image = self.image_time(&slit_series, slit_window.as_ref());

        target.slit_series = slit_series;
        target.slit_window = slit_window;
        target.image_time = image.map(|(t, _)| t);
        target.image_altitude_deg = image.map(|(_, alt)| alt);
        image.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use chrono::TimeZone;

    fn night() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn rules(locked: bool) -> VisibilityRules {
        VisibilityRules {
            night: night(),
            dome_azimuth: 180.0,
            slit_width: 30.0,
            dome_locked: locked,
            max_altitude: 90.0,
            min_moon_distance: 20.0,
            meridian_margin: 0.0,
            rounding_minutes: 5,
        }
    }

    fn sample(hour: u32, minute: u32, alt: f64, az: f64) -> AltitudeSample {
        AltitudeSample {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 2, hour, minute, 0).unwrap(),
            altitude_deg: alt,
            azimuth_deg: az,
            hour_angle_deg: (az - 180.0) / 2.0,
            parallactic_angle_deg: 0.0,
            airmass: crate::services::altitude::airmass(alt),
            moon_separation_deg: 60.0,
        }
    }

    fn limits() -> SampleLimits {
        SampleLimits {
            min_altitude: 30.0,
            max_altitude: 90.0,
            airmass_min: 0.0,
            airmass_max: 4.0,
        }
    }

    #[test]
    fn test_in_slit_wraps_north() {
        let mut r = rules(true);
        r.dome_azimuth = 5.0;
        assert!(r.in_slit(355.0));
        assert!(r.in_slit(20.0));
        assert!(!r.in_slit(21.0));
        assert!(!r.in_slit(340.0));
    }

    #[test]
    fn test_locked_slit_series_uses_azimuth() {
        let series = vec![
            sample(3, 0, 40.0, 150.0),
            sample(3, 3, 45.0, 170.0),
            sample(3, 6, 50.0, 190.0),
            sample(3, 9, 52.0, 200.0),
        ];
        let slit = rules(true).slit_series(&series, &limits());
        assert_eq!(slit.len(), 2);
        assert_eq!(slit[0].azimuth_deg, 170.0);

        let free = rules(false).slit_series(&series, &limits());
        assert_eq!(free.len(), 4);
    }

    #[test]
    fn test_slit_series_respects_altitude_and_night() {
        let series = vec![
            sample(1, 0, 60.0, 180.0), // before dusk
            sample(3, 0, 25.0, 180.0), // too low
            sample(4, 0, 60.0, 180.0),
        ];
        let slit = rules(true).slit_series(&series, &limits());
        assert_eq!(slit.len(), 1);
        assert_eq!(slit[0].timestamp.format("%H").to_string(), "04");
    }

    #[test]
    fn test_locked_image_time_is_rounded_slit_entry() {
        let r = rules(true);
        let series = vec![sample(3, 2, 40.0, 170.0), sample(3, 5, 45.0, 175.0)];
        let window = SlitWindow::from_samples(&series, Duration::minutes(3));
        let (time, alt) = r.image_time(&series, window.as_ref()).unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2024, 3, 2, 3, 5, 0).unwrap());
        assert_eq!(alt, 40.0);
    }

    #[test]
    fn test_free_image_time_skips_moon_and_meridian() {
        let mut r = rules(false);
        r.meridian_margin = 2.0;
        let mut near_moon = sample(5, 0, 70.0, 170.0);
        near_moon.moon_separation_deg = 5.0;
        let transit = sample(6, 0, 72.0, 180.0);
        let ok = sample(7, 0, 65.0, 190.0);
        let series = vec![near_moon, transit, ok];
        let (time, alt) = r.image_time(&series, None).unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2024, 3, 2, 7, 0, 0).unwrap());
        assert_eq!(alt, 65.0);
    }

    #[test]
    fn test_image_time_stays_inside_night() {
        let mut r = rules(false);
        r.night = TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 11, 58, 0).unwrap(),
        )
        .unwrap();
        let series = vec![sample(11, 0, 40.0, 200.0), sample(11, 57, 55.0, 200.0)];
        let (time, alt) = r.image_time(&series, None).unwrap();
        // rounding would give 12:00, after dawn
        assert_eq!(time, Utc.with_ymd_and_hms(2024, 3, 2, 11, 57, 0).unwrap());
        assert!(r.night.contains(time));
        assert_eq!(alt, 55.0);
    }

    #[test]
    fn test_evaluate_without_samples_has_no_image_time() {
        let mut target = Target::new("WDS 00000+0000", Coordinates::new(10.0, 20.0));
        target.min_altitude_deg = 30.0;
        target.altitude_series = vec![sample(3, 0, 10.0, 180.0)];
        assert!(!rules(false).evaluate(&mut target, Duration::minutes(3)));
        assert!(target.image_time.is_none());
        assert!(target.slit_window.is_none());
    }
}
