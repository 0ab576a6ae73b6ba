use chrono::{DateTime, Duration, Utc};
use serde::*;

/// MJD of the J2000.0 epoch (2000-01-01 12:00 TT, treated as UTC here).
pub const MJD_J2000: f64 = 51544.5;

/// Modified Julian Date representation.
/// MJD 0 = 1858-11-17 00:00:00 UTC
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ModifiedJulianDate(f64);

impl ModifiedJulianDate {
    /// Create a new MJD value.
    pub fn new(v: f64) -> Self {
        Self(v)
    }

    /// Raw MJD value as f64.
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Julian Date.
    pub fn julian_day(&self) -> f64 {
        self.0 + 2_400_000.5
    }

    /// Days elapsed since J2000.0.
    pub fn days_since_j2000(&self) -> f64 {
        self.0 - MJD_J2000
    }

    /// Julian centuries elapsed since J2000.0.
    pub fn centuries_since_j2000(&self) -> f64 {
        self.days_since_j2000() / 36525.0
    }

    /// Convert to Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn to_unix_timestamp(&self) -> f64 {
        (self.value() - 40587.0) * 86400.0
    }

    /// Create from Unix timestamp (seconds since 1970-01-01 00:00:00 UTC).
    pub fn from_unix_timestamp(timestamp: f64) -> Self {
        Self::new(timestamp / 86400.0 + 40587.0)
    }

    /// Convert to chrono DateTime<Utc>.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        let secs = self.to_unix_timestamp();
        let secs_i64 = secs.floor() as i64;
        let nanos = ((secs - secs.floor()) * 1e9) as u32;
        DateTime::from_timestamp(secs_i64, nanos).unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Create from chrono DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self::from_unix_timestamp(dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9)
    }

    /// Greenwich mean sidereal time in degrees, [0, 360).
    pub fn gmst_deg(&self) -> f64 {
        let d = self.days_since_j2000();
        let t = self.centuries_since_j2000();
        let theta = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
            - t * t * t / 38_710_000.0;
        theta.rem_euclid(360.0)
    }

    /// Local mean sidereal time in degrees for an east-positive longitude.
    pub fn lmst_deg(&self, longitude_deg: f64) -> f64 {
        (self.gmst_deg() + longitude_deg).rem_euclid(360.0)
    }
}

impl From<f64> for ModifiedJulianDate {
    fn from(v: f64) -> Self {
        ModifiedJulianDate::new(v)
    }
}

impl From<DateTime<Utc>> for ModifiedJulianDate {
    fn from(dt: DateTime<Utc>) -> Self {
        ModifiedJulianDate::from_datetime(dt)
    }
}

/// Round `t` up to the next multiple of `minutes` past the hour.
///
/// A timestamp already on a boundary is returned unchanged.
pub fn round_up_to_minutes(t: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    if minutes == 0 {
        return t;
    }
    let step = i64::from(minutes) * 60;
    let rem = t.timestamp().rem_euclid(step);
    let nanos = i64::from(t.timestamp_subsec_nanos());
    if rem == 0 && nanos == 0 {
        return t;
    }
    t + Duration::seconds(step - rem) - Duration::nanoseconds(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    #[test]
    fn test_mjd_new() {
        let mjd = ModifiedJulianDate::new(50000.0);
        assert_eq!(mjd.value(), 50000.0);
    }

    #[test]
    fn test_mjd_ordering() {
        let mjd1 = ModifiedJulianDate::new(50000.0);
        let mjd2 = ModifiedJulianDate::new(51000.0);

        assert!(mjd1 < mjd2);
        assert!(mjd2 > mjd1);
    }

    #[test]
    fn test_mjd_to_unix_timestamp() {
        // MJD 40587.0 corresponds to Unix epoch (1970-01-01)
        let mjd = ModifiedJulianDate::new(40587.0);
        assert!((mjd.to_unix_timestamp()).abs() < 1.0);
    }

    #[test]
    fn test_mjd_roundtrip_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 4, 30, 15).unwrap();
        let back = ModifiedJulianDate::from_datetime(dt).to_datetime();
        assert!((back - dt).num_milliseconds().abs() < 2);
    }

    #[test]
    fn test_j2000_epoch() {
        let dt = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let mjd = ModifiedJulianDate::from_datetime(dt);
        assert_abs_diff_eq!(mjd.value(), MJD_J2000, epsilon = 1e-9);
        assert_abs_diff_eq!(mjd.julian_day(), 2_451_545.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mjd.gmst_deg(), 280.460_618_37, epsilon = 1e-6);
    }

    #[test]
    fn test_gmst_reference_value() {
        // 1987-04-10 0h UT: GMST = 13h10m46.3668s
        let dt = Utc.with_ymd_and_hms(1987, 4, 10, 0, 0, 0).unwrap();
        let gmst = ModifiedJulianDate::from_datetime(dt).gmst_deg();
        let expected = (13.0 + 10.0 / 60.0 + 46.3668 / 3600.0) * 15.0;
        assert_abs_diff_eq!(gmst, expected, epsilon = 1e-4);
    }

    #[test]
    fn test_lmst_wraps() {
        let mjd = ModifiedJulianDate::new(MJD_J2000);
        let lmst = mjd.lmst_deg(100.0);
        assert!((0.0..360.0).contains(&lmst));
        assert_abs_diff_eq!(lmst, 20.460_618_37, epsilon = 1e-6);
    }

    #[test]
    fn test_round_up_to_minutes() {
        let t = Utc.with_ymd_and_hms(2024, 3, 1, 4, 31, 10).unwrap();
        assert_eq!(
            round_up_to_minutes(t, 5),
            Utc.with_ymd_and_hms(2024, 3, 1, 4, 35, 0).unwrap()
        );

        let on_boundary = Utc.with_ymd_and_hms(2024, 3, 1, 4, 35, 0).unwrap();
        assert_eq!(round_up_to_minutes(on_boundary, 5), on_boundary);

        let late = Utc.with_ymd_and_hms(2024, 3, 1, 23, 58, 0).unwrap();
        assert_eq!(
            round_up_to_minutes(late, 5),
            Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()
        );
    }
}
