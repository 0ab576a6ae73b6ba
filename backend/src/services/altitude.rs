//! Time-altitude series computation.
//!
//! For an equatorial position and a time range this produces a sampled
//! series of altitude, azimuth, hour angle, parallactic angle, airmass and
//! lunar separation. The per-time quantities that do not depend on the
//! target (sidereal time, Moon position) are computed once into a
//! `SampleGrid`, which is then shared by every target of a night.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::api::{GeographicLocation, TimeWindow};
use crate::config::ObserverSettings;
use crate::error::SchedulerResult;
use crate::models::{AltitudeSample, Coordinates, ModifiedJulianDate};
use crate::services::ephemeris::{LowPrecisionMoon, MoonEphemeris};

/// Altitude/azimuth/hour angle/parallactic angle of one position, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalPosition {
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
    pub hour_angle_deg: f64,
    pub parallactic_angle_deg: f64,
}

/// Closed-form equatorial to horizontal conversion.
///
/// Azimuth runs from north through east.
pub fn horizontal_from_hour_angle(
    hour_angle_deg: f64,
    dec_deg: f64,
    latitude_deg: f64,
) -> HorizontalPosition {
    let h = hour_angle_deg.to_radians();
    let d = dec_deg.to_radians();
    let phi = latitude_deg.to_radians();

    let sin_alt = phi.sin() * d.sin() + phi.cos() * d.cos() * h.cos();
    let altitude = sin_alt.clamp(-1.0, 1.0).asin();
    let azimuth = (-d.cos() * h.sin()).atan2(d.sin() * phi.cos() - d.cos() * h.cos() * phi.sin());
    let parallactic = h.sin().atan2(phi.tan() * d.cos() - d.sin() * h.cos());

    HorizontalPosition {
        altitude_deg: altitude.to_degrees(),
        azimuth_deg: azimuth.to_degrees().rem_euclid(360.0),
        hour_angle_deg: normalize_signed(hour_angle_deg),
        parallactic_angle_deg: parallactic.to_degrees(),
    }
}

/// Wrap an angle to [-180, 180).
pub fn normalize_signed(deg: f64) -> f64 {
    (deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Relative air mass (Pickering 2002).
///
/// Finite at the horizon (about 38) and non-increasing up to exactly 1 at
/// the zenith. Altitudes below 0 are treated as 0; NaN stays NaN.
pub fn airmass(altitude_deg: f64) -> f64 {
    let h = altitude_deg.clamp(0.0, 90.0);
    // the refraction-like term pushes the argument past 90 near the zenith
    let apparent = (h + 244.0 / (165.0 + 47.0 * h.powf(1.1))).min(90.0);
    1.0 / apparent.to_radians().sin()
}

/// Minimum altitude per azimuth, linearly interpolated with wrap-around.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HorizonProfile {
    /// (azimuth, altitude) sorted by azimuth
    points: Vec<(f64, f64)>,
}

impl HorizonProfile {
    /// Flat 0° horizon.
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn from_points(points: &[[f64; 2]]) -> Self {
        let mut points: Vec<(f64, f64)> = points
            .iter()
            .filter(|p| p[0].is_finite() && p[1].is_finite())
            .map(|p| (p[0].rem_euclid(360.0), p[1]))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    pub fn min_altitude(&self, azimuth_deg: f64) -> f64 {
        match self.points.len() {
            0 => 0.0,
            1 => self.points[0].1,
            n => {
                let az = azimuth_deg.rem_euclid(360.0);
                let upper = self.points.iter().position(|p| p.0 >= az);
                let (lo, hi) = match upper {
                    Some(0) | None => {
                        // between the last point and the first, across north
                        let lo = self.points[n - 1];
                        let hi = (self.points[0].0 + 360.0, self.points[0].1);
                        let az = if az < lo.0 { az + 360.0 } else { az };
                        return interpolate(lo, hi, az);
                    }
                    Some(i) => (self.points[i - 1], self.points[i]),
                };
                interpolate(lo, hi, az)
            }
        }
    }
}

fn interpolate(lo: (f64, f64), hi: (f64, f64), x: f64) -> f64 {
    let span = hi.0 - lo.0;
    if span <= f64::EPSILON {
        return lo.1;
    }
    lo.1 + (hi.1 - lo.1) * (x - lo.0) / span
}

/// Target-independent quantities for a set of sample times.
#[derive(Debug, Clone)]
pub struct SampleGrid {
    pub times: Vec<DateTime<Utc>>,
    lst_deg: Vec<f64>,
    moon: Vec<Coordinates>,
    step: Duration,
}

impl SampleGrid {
    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Computes altitude series for one observer.
#[derive(Clone)]
pub struct AltitudeModel {
    observer: GeographicLocation,
    horizon: HorizonProfile,
    moon: Arc<dyn MoonEphemeris>,
}

impl AltitudeModel {
    pub fn new(observer: GeographicLocation) -> Self {
        Self {
            observer,
            horizon: HorizonProfile::flat(),
            moon: Arc::new(LowPrecisionMoon),
        }
    }

    /// Model for the configured site and horizon.
    pub fn from_settings(settings: &ObserverSettings) -> SchedulerResult<Self> {
        let model = Self::new(settings.location()?);
        Ok(if settings.horizon.is_empty() {
            model
        } else {
            model.with_horizon(HorizonProfile::from_points(&settings.horizon))
        })
    }

    pub fn with_horizon(mut self, horizon: HorizonProfile) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_moon(mut self, moon: Arc<dyn MoonEphemeris>) -> Self {
        self.moon = moon;
        self
    }

    pub fn observer(&self) -> &GeographicLocation {
        &self.observer
    }

    pub fn horizon(&self) -> &HorizonProfile {
        &self.horizon
    }

    /// Sample times from `window.start` to `window.end` inclusive.
    ///
    /// A non-positive step yields an empty grid.
    pub fn grid(&self, window: &TimeWindow, step_hours: f64) -> SampleGrid {
        let step = Duration::milliseconds((step_hours * 3_600_000.0).round() as i64);
        let mut times = Vec::new();
        if step > Duration::zero() {
            let mut t = window.start;
            while t <= window.end {
                times.push(t);
                t += step;
            }
        }
        let lst_deg = times
            .iter()
            .map(|t| ModifiedJulianDate::from_datetime(*t).lmst_deg(self.observer.longitude))
            .collect();
        let moon = times
            .iter()
            .map(|t| self.moon.moon_position(*t, &self.observer))
            .collect();
        SampleGrid {
            times,
            lst_deg,
            moon,
            step,
        }
    }

    /// Horizontal position of `coords` (J2000) at `time`.
    pub fn horizontal(&self, coords: &Coordinates, time: DateTime<Utc>) -> HorizontalPosition {
        let apparent = coords.to_apparent(time);
        let lst = ModifiedJulianDate::from_datetime(time).lmst_deg(self.observer.longitude);
        horizontal_from_hour_angle(lst - apparent.ra_deg, apparent.dec_deg, self.observer.latitude)
    }

    /// Single sample at `time`, regardless of the horizon.
    pub fn sample_at(&self, coords: &Coordinates, time: DateTime<Utc>) -> AltitudeSample {
        let pos = self.horizontal(coords, time);
        let moon = self.moon.moon_position(time, &self.observer);
        AltitudeSample {
            timestamp: time,
            altitude_deg: pos.altitude_deg,
            azimuth_deg: pos.azimuth_deg,
            hour_angle_deg: pos.hour_angle_deg,
            parallactic_angle_deg: pos.parallactic_angle_deg,
            airmass: airmass(pos.altitude_deg),
            moon_separation_deg: coords.separation_deg(&moon),
        }
    }

    /// Series of `coords` on a precomputed grid.
    ///
    /// Samples below the horizon profile are left out. Non-finite input
    /// produces non-finite samples rather than a panic; callers filter them.
    pub fn series_on_grid(&self, coords: &Coordinates, grid: &SampleGrid) -> Vec<AltitudeSample> {
        let Some(mid) = grid.times.get(grid.len() / 2) else {
            return Vec::new();
        };
        // precession drifts by well under an arcsecond over one night
        let apparent = coords.to_apparent(*mid);

        grid.times
            .iter()
            .zip(&grid.lst_deg)
            .zip(&grid.moon)
            .filter_map(|((time, lst), moon)| {
                let pos =
                    horizontal_from_hour_angle(lst - apparent.ra_deg, apparent.dec_deg, self.observer.latitude);
                if pos.altitude_deg < self.horizon.min_altitude(pos.azimuth_deg) {
                    return None;
                }
                Some(AltitudeSample {
                    timestamp: *time,
                    altitude_deg: pos.altitude_deg,
                    azimuth_deg: pos.azimuth_deg,
                    hour_angle_deg: pos.hour_angle_deg,
                    parallactic_angle_deg: pos.parallactic_angle_deg,
                    airmass: airmass(pos.altitude_deg),
                    moon_separation_deg: coords.separation_deg(moon),
                })
            })
            .collect()
    }

    /// Series of `coords` between `start` and `end` every `step_hours`.
    pub fn compute_series(
        &self,
        coords: &Coordinates,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_hours: f64,
    ) -> Vec<AltitudeSample> {
        match TimeWindow::new(start, end) {
            Some(window) => self.series_on_grid(coords, &self.grid(&window, step_hours)),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for AltitudeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AltitudeModel")
            .field("observer", &self.observer)
            .field("horizon", &self.horizon)
            .finish_non_exhaustive()
    }
}
