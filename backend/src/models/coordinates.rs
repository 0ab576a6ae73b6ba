//! Equatorial coordinates (J2000) with sexagesimal parsing and precession.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::time::ModifiedJulianDate;

/// Equatorial position referenced to the J2000 equinox, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Right ascension, 0..360
    pub ra_deg: f64,
    /// Declination, -90..90
    pub dec_deg: f64,
}

impl Coordinates {
    pub fn new(ra_deg: f64, dec_deg: f64) -> Self {
        Self {
            ra_deg: ra_deg.rem_euclid(360.0),
            dec_deg,
        }
    }

    /// Parse an RA/Dec pair.
    ///
    /// Sexagesimal RA ("10 30 00", "10:30:00", "10h30m00s") is read as hours;
    /// a bare decimal number is read as degrees. Dec accepts "+20 00 00",
    /// "-05:30:00", "20d30m" or decimal degrees.
    pub fn parse(ra: &str, dec: &str) -> Option<Self> {
        let ra_deg = parse_ra(ra)?;
        let dec_deg = parse_dec(dec)?;
        if !(-90.0..=90.0).contains(&dec_deg) {
            return None;
        }
        Some(Self::new(ra_deg, dec_deg))
    }

    /// Both components zero (an empty catalog row) or not finite.
    pub fn is_missing(&self) -> bool {
        !self.ra_deg.is_finite()
            || !self.dec_deg.is_finite()
            || (self.ra_deg == 0.0 && self.dec_deg == 0.0)
    }

    /// Great-circle distance to `other` in degrees.
    pub fn separation_deg(&self, other: &Coordinates) -> f64 {
        angular_separation_deg(self.ra_deg, self.dec_deg, other.ra_deg, other.dec_deg)
    }

    /// Apparent (mean equinox of date) position at `time`.
    pub fn to_apparent(&self, time: DateTime<Utc>) -> Coordinates {
        self.precess_to(ModifiedJulianDate::from_datetime(time))
    }

    /// IAU 1976 precession from J2000 to the equinox of `epoch`.
    /// Nutation and aberration are ignored.
    pub fn precess_to(&self, epoch: ModifiedJulianDate) -> Coordinates {
        let t = epoch.centuries_since_j2000();
        let arcsec = |v: f64| (v / 3600.0).to_radians();
        let zeta = arcsec(2306.2181 * t + 0.30188 * t * t + 0.017998 * t * t * t);
        let z = arcsec(2306.2181 * t + 1.09468 * t * t + 0.018203 * t * t * t);
        let theta = arcsec(2004.3109 * t - 0.42665 * t * t - 0.041833 * t * t * t);

        let ra0 = self.ra_deg.to_radians();
        let dec0 = self.dec_deg.to_radians();

        let a = dec0.cos() * (ra0 + zeta).sin();
        let b = theta.cos() * dec0.cos() * (ra0 + zeta).cos() - theta.sin() * dec0.sin();
        let c = theta.sin() * dec0.cos() * (ra0 + zeta).cos() + theta.cos() * dec0.sin();

        let ra = a.atan2(b) + z;
        let dec = c.clamp(-1.0, 1.0).asin();
        Coordinates::new(ra.to_degrees(), dec.to_degrees())
    }

    /// RA as "HH MM SS.ss".
    pub fn ra_hms(&self) -> String {
        let (h, m, s) = split_sexagesimal(self.ra_deg / 15.0);
        format!("{:02} {:02} {:05.2}", h, m, s)
    }

    /// Dec as "+DD MM SS.s".
    pub fn dec_dms(&self) -> String {
        let sign = if self.dec_deg < 0.0 { '-' } else { '+' };
        let (d, m, s) = split_sexagesimal(self.dec_deg.abs());
        format!("{}{:02} {:02} {:04.1}", sign, d, m, s)
    }
}

/// Great-circle separation of two (ra, dec) pairs, all in degrees.
///
/// Uses the Vincenty form, which stays accurate for both tiny and
/// near-antipodal separations.
pub fn angular_separation_deg(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (ra1, dec1, ra2, dec2) = (
        ra1.to_radians(),
        dec1.to_radians(),
        ra2.to_radians(),
        dec2.to_radians(),
    );
    let d_ra = ra2 - ra1;
    let num1 = dec2.cos() * d_ra.sin();
    let num2 = dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * d_ra.cos();
    let den = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * d_ra.cos();
    (num1.hypot(num2)).atan2(den).to_degrees()
}

fn split_sexagesimal(value: f64) -> (u32, u32, f64) {
    let total_secs = (value * 3600.0 * 100.0).round() / 100.0;
    let whole = (total_secs / 3600.0).floor();
    let rem = total_secs - whole * 3600.0;
    let minutes = (rem / 60.0).floor();
    let seconds = rem - minutes * 60.0;
    (whole as u32, minutes as u32, seconds)
}

/// Split "10 30 00", "10:30:00" or "10h30m00s" into numeric fields.
fn sexagesimal_fields(s: &str) -> Option<(bool, Vec<f64>)> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-');
    let cleaned: String = trimmed
        .trim_start_matches(['+', '-'])
        .chars()
        .map(|c| match c {
            ':' | 'h' | 'H' | 'm' | 'M' | 'd' | 'D' | '°' | '\'' | '"' => ' ',
            's' | 'S' => ' ',
            other => other,
        })
        .collect();
    let fields = cleaned
        .split_whitespace()
        .map(|f| f.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if fields.is_empty() || fields.len() > 3 {
        return None;
    }
    Some((negative, fields))
}

fn is_sexagesimal(s: &str) -> bool {
    let t = s.trim().trim_start_matches(['+', '-']);
    t.contains(|c: char| c.is_whitespace() || ":hHmMdD°'\"".contains(c))
}

fn fields_to_value(fields: &[f64]) -> f64 {
    fields
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(v, div)| v / div)
        .sum()
}

/// Parse right ascension to degrees. Sexagesimal input is hours.
pub fn parse_ra(s: &str) -> Option<f64> {
    if s.trim().is_empty() {
        return None;
    }
    if is_sexagesimal(s) {
        let (negative, fields) = sexagesimal_fields(s)?;
        if negative {
            return None;
        }
        let hours = fields_to_value(&fields);
        if !(0.0..24.0).contains(&hours) {
            return None;
        }
        Some(hours * 15.0)
    } else {
        let deg = s.trim().parse::<f64>().ok()?;
        if !deg.is_finite() || !(0.0..=360.0).contains(&deg) {
            return None;
        }
        Some(deg.rem_euclid(360.0))
    }
}

/// Parse declination to degrees.
pub fn parse_dec(s: &str) -> Option<f64> {
    if s.trim().is_empty() {
        return None;
    }
    let deg = if is_sexagesimal(s) {
        let (negative, fields) = sexagesimal_fields(s)?;
        let value = fields_to_value(&fields);
        if negative {
            -value
        } else {
            value
        }
    } else {
        s.trim().parse::<f64>().ok()?
    };
    deg.is_finite().then_some(deg)
}
