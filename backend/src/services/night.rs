//! Night window computation service.
//!
//! Computes the twilight-to-twilight interval (Sun below the configured
//! twilight altitude, nautical by default) of one observing night for a
//! given observer location.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::api::{GeographicLocation, TimeWindow};
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::models::ModifiedJulianDate;
use crate::services::altitude::horizontal_from_hour_angle;
use crate::services::ephemeris::sun_position;

/// Nautical twilight: Sun center 12° below the horizon.
pub const NAUTICAL_TWILIGHT: f64 = -12.0;

const SCAN_STEP_MINUTES: i64 = 10;

/// Observing night a timestamp belongs to.
///
/// A night is named after the local calendar date on which it starts, so
/// everything up to local noon of the next day still belongs to it.
pub fn observing_night_date(now: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    (now + Duration::minutes(i64::from(utc_offset_minutes)) - Duration::hours(12)).date_naive()
}

/// Altitude of the Sun's center in degrees.
pub fn sun_altitude(location: &GeographicLocation, time: DateTime<Utc>) -> f64 {
    let mjd = ModifiedJulianDate::from_datetime(time);
    let sun = sun_position(mjd);
    let lst = mjd.lmst_deg(location.longitude);
    horizontal_from_hour_angle(lst - sun.ra_deg, sun.dec_deg, location.latitude).altitude_deg
}

/// Twilight-to-twilight window of the night starting on `night_date`.
///
/// The search covers 24 hours from local mean noon of `night_date`. Under
/// polar night the whole search span is returned; when the Sun never sinks
/// below `twilight_altitude` the night window cannot be computed.
pub fn compute_night_window(
    location: &GeographicLocation,
    night_date: NaiveDate,
    twilight_altitude: f64,
) -> SchedulerResult<TimeWindow> {
    location.validate().map_err(SchedulerError::night_window)?;

    let utc_noon = night_date.and_time(NaiveTime::MIN).and_utc() + Duration::hours(12);
    let search_start =
        utc_noon - Duration::milliseconds((location.longitude / 15.0 * 3_600_000.0) as i64);
    let search_end = search_start + Duration::hours(24);

    let below = |t: DateTime<Utc>| sun_altitude(location, t) < twilight_altitude;

    let step = Duration::minutes(SCAN_STEP_MINUTES);
    let mut dusk: Option<DateTime<Utc>> = below(search_start).then_some(search_start);
    let mut dawn: Option<DateTime<Utc>> = None;

    let mut prev = search_start;
    let mut prev_below = below(prev);
    let mut t = search_start + step;
    while t <= search_end {
        let now_below = below(t);
        if !prev_below && now_below && dusk.is_none() {
            dusk = Some(bisect(prev, t, &below));
        } else if prev_below && !now_below && dusk.is_some() {
            dawn = Some(bisect(prev, t, &below));
            break;
        }
        prev = t;
        prev_below = now_below;
        t += step;
    }

    let Some(start) = dusk else {
        return Err(SchedulerError::night_window(format!(
            "Sun does not reach {:.1}° on the night of {}",
            twilight_altitude, night_date
        )));
    };
    let end = dawn.unwrap_or(search_end);

    TimeWindow::new(start, end).ok_or_else(|| {
        SchedulerError::night_window(format!("Empty night window on {}", night_date))
    })
}

/// The night being observed: its date and twilight window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservingNight {
    pub date: NaiveDate,
    pub window: TimeWindow,
}

impl ObservingNight {
    /// Night containing `now` for the configured observer.
    pub fn containing(config: &SchedulerConfig, now: DateTime<Utc>) -> SchedulerResult<Self> {
        let date = observing_night_date(now, config.observer.utc_offset_minutes);
        Self::for_date(config, date)
    }

    pub fn for_date(config: &SchedulerConfig, date: NaiveDate) -> SchedulerResult<Self> {
        let location = config
            .observer
            .location()
            .map_err(|e| e.with_operation("compute_night_window"))?;
        let window =
            compute_night_window(&location, date, config.night.twilight_sun_altitude)?;
        Ok(Self { date, window })
    }
}

/// Refine the crossing between `a` (state of `a`) and `b` to one second.
fn bisect<F>(mut a: DateTime<Utc>, mut b: DateTime<Utc>, below: &F) -> DateTime<Utc>
where
    F: Fn(DateTime<Utc>) -> bool,
{
    let a_state = below(a);
    while b - a > Duration::seconds(1) {
        let mid = a + (b - a) / 2;
        if below(mid) == a_state {
            a = mid;
        } else {
            b = mid;
        }
    }
    b
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_night_window_roque_de_los_muchachos() {
        let location = GeographicLocation::new(28.7624, -17.8892, Some(2396.0)).unwrap();
        let night = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let window = compute_night_window(&location, night, NAUTICAL_TWILIGHT).unwrap();

        // Nautical night in mid-January there is roughly 11-12 hours
        let hours = window.duration().num_minutes() as f64 / 60.0;
        assert!(hours > 10.5 && hours < 13.0, "got {:.2} h", hours);

        // Dusk in the evening UTC, dawn next morning
        assert_eq!(window.start.date_naive(), night);
        assert!(window.start.hour() >= 18 && window.start.hour() <= 20);
        assert!(window.end.hour() >= 6 && window.end.hour() <= 8);

        assert!(sun_altitude(&location, window.start + Duration::hours(1)) < NAUTICAL_TWILIGHT);
        assert!(sun_altitude(&location, window.start - Duration::minutes(10)) > NAUTICAL_TWILIGHT);
    }

    #[test]
    fn test_night_window_tucson() {
        let location = GeographicLocation::new(32.0, -110.0, None).unwrap();
        let night = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let window = compute_night_window(&location, night, NAUTICAL_TWILIGHT).unwrap();
        // local dusk ~19:00 MST = 02:00 UTC next day
        assert_eq!(window.start.date_naive(), night.succ_opt().unwrap());
        assert!(window.start.hour() >= 1 && window.start.hour() <= 3);
    }

    #[test]
    fn test_midsummer_arctic_has_no_night() {
        let location = GeographicLocation::new(70.0, 20.0, None).unwrap();
        let night = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let err = compute_night_window(&location, night, NAUTICAL_TWILIGHT).unwrap_err();
        assert!(matches!(err, SchedulerError::NightWindowError { .. }));
    }

    #[test]
    fn test_polar_night_spans_search() {
        let location = GeographicLocation::new(85.0, 0.0, None).unwrap();
        let night = NaiveDate::from_ymd_opt(2024, 12, 21).unwrap();
        let window = compute_night_window(&location, night, NAUTICAL_TWILIGHT).unwrap();
        assert_eq!(window.duration(), Duration::hours(24));
    }

    #[test]
    fn test_invalid_location_fails() {
        let location = GeographicLocation {
            latitude: f64::NAN,
            longitude: 0.0,
            elevation_m: None,
        };
        let night = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(compute_night_window(&location, night, NAUTICAL_TWILIGHT).is_err());
    }

    #[test]
    fn test_observing_night_from_config() {
        let mut config = SchedulerConfig::default();
        config.observer.latitude = 32.0;
        config.observer.longitude = -110.0;
        config.observer.utc_offset_minutes = -7 * 60;
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 5, 0, 0).unwrap();
        let night = ObservingNight::containing(&config, now).unwrap();
        assert_eq!(night.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(night.window.contains(now));
    }

    #[test]
    fn test_observing_night_date() {
        let offset = -7 * 60;
        // 2024-03-02 05:00 UTC = 2024-03-01 22:00 local: night of March 1
        let late = Utc.with_ymd_and_hms(2024, 3, 2, 5, 0, 0).unwrap();
        assert_eq!(
            observing_night_date(late, offset),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        // 2024-03-02 12:00 UTC = 05:00 local, still the night of March 1
        let dawn = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(
            observing_night_date(dawn, offset),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        // 2024-03-02 20:00 UTC = 13:00 local, the night of March 2
        let afternoon = Utc.with_ymd_and_hms(2024, 3, 2, 20, 0, 0).unwrap();
        assert_eq!(
            observing_night_date(afternoon, offset),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }
}
