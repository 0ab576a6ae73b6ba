//! Low-precision Sun and Moon positions.
//!
//! Accuracy is a fraction of a degree for the Sun and about half a degree
//! for the (geocentric) Moon, which is enough for twilight times and for
//! moon-avoidance distances.

use chrono::{DateTime, Utc};

use crate::api::GeographicLocation;
use crate::models::{Coordinates, ModifiedJulianDate};

/// Source of the Moon's apparent equatorial position.
pub trait MoonEphemeris: Send + Sync {
    fn moon_position(&self, time: DateTime<Utc>, observer: &GeographicLocation) -> Coordinates;
}

/// Truncated lunar series (Astronomical Almanac low-precision formulae).
#[derive(Debug, Default, Clone, Copy)]
pub struct LowPrecisionMoon;

impl MoonEphemeris for LowPrecisionMoon {
    fn moon_position(&self, time: DateTime<Utc>, _observer: &GeographicLocation) -> Coordinates {
        moon_position(ModifiedJulianDate::from_datetime(time))
    }
}

fn sin_deg(x: f64) -> f64 {
    x.to_radians().sin()
}

fn obliquity_deg(mjd: ModifiedJulianDate) -> f64 {
    23.439 - 0.000_000_4 * mjd.days_since_j2000()
}

fn ecliptic_to_equatorial(lambda_deg: f64, beta_deg: f64, epsilon_deg: f64) -> Coordinates {
    let (l, b, e) = (
        lambda_deg.to_radians(),
        beta_deg.to_radians(),
        epsilon_deg.to_radians(),
    );
    let ra = (l.sin() * e.cos() - b.tan() * e.sin()).atan2(l.cos());
    let dec = (b.sin() * e.cos() + b.cos() * e.sin() * l.sin()).clamp(-1.0, 1.0).asin();
    Coordinates::new(ra.to_degrees(), dec.to_degrees())
}

/// Geocentric position of the Sun.
pub fn sun_position(mjd: ModifiedJulianDate) -> Coordinates {
    let n = mjd.days_since_j2000();
    let mean_longitude = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
    let mean_anomaly = (357.528 + 0.985_600_3 * n).rem_euclid(360.0);
    let lambda =
        mean_longitude + 1.915 * sin_deg(mean_anomaly) + 0.020 * sin_deg(2.0 * mean_anomaly);
    ecliptic_to_equatorial(lambda, 0.0, obliquity_deg(mjd))
}

/// Geocentric position of the Moon.
pub fn moon_position(mjd: ModifiedJulianDate) -> Coordinates {
    let t = mjd.centuries_since_j2000();
    let lambda = 218.32 + 481_267.881 * t + 6.29 * sin_deg(134.9 + 477_198.85 * t)
        - 1.27 * sin_deg(259.2 - 413_335.38 * t)
        + 0.66 * sin_deg(235.7 + 890_534.23 * t)
        + 0.21 * sin_deg(269.9 + 954_397.70 * t)
        - 0.19 * sin_deg(357.5 + 35_999.05 * t)
        - 0.11 * sin_deg(186.6 + 966_404.05 * t);
    let beta = 5.13 * sin_deg(93.3 + 483_202.03 * t) + 0.28 * sin_deg(228.2 + 960_400.87 * t)
        - 0.28 * sin_deg(318.3 + 6_003.18 * t)
        - 0.17 * sin_deg(217.6 - 407_332.20 * t);
    ecliptic_to_equatorial(lambda.rem_euclid(360.0), beta, obliquity_deg(mjd))
}
