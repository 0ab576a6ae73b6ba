use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One point of a target's time-altitude series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltitudeSample {
    pub timestamp: DateTime<Utc>,
    pub altitude_deg: f64,
    /// Azimuth from north through east, 0..360
    pub azimuth_deg: f64,
    /// Hour angle, -180..180 (negative east of the meridian)
    pub hour_angle_deg: f64,
    pub parallactic_angle_deg: f64,
    pub airmass: f64,
    pub moon_separation_deg: f64,
}

impl AltitudeSample {
    /// Every numeric field is finite.
    pub fn is_finite(&self) -> bool {
        self.altitude_deg.is_finite()
            && self.azimuth_deg.is_finite()
            && self.hour_angle_deg.is_finite()
            && self.airmass.is_finite()
            && self.moon_separation_deg.is_finite()
    }
}

/// Entry time and dwell of a dome-slit sub-series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlitWindow {
    pub start: DateTime<Utc>,
    /// Dwell inside the slit, whole seconds
    pub dwell_secs: i64,
}

impl SlitWindow {
    /// Earliest sample time and total sampled dwell (`len * step`).
    pub fn from_samples(samples: &[AltitudeSample], step: Duration) -> Option<Self> {
        let first = samples.first()?;
        Some(Self {
            start: first.timestamp,
            dwell_secs: step.num_seconds() * samples.len() as i64,
        })
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.dwell_secs)
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.duration()
    }
}

/// Sample with the greatest altitude, ignoring non-finite entries.
pub fn highest_sample(samples: &[AltitudeSample]) -> Option<&AltitudeSample> {
    samples
        .iter()
        .filter(|s| s.altitude_deg.is_finite())
        .max_by(|a, b| a.altitude_deg.total_cmp(&b.altitude_deg))
}

/// Sample closest in time to `t`.
pub fn sample_nearest(samples: &[AltitudeSample], t: DateTime<Utc>) -> Option<&AltitudeSample> {
    samples
        .iter()
        .min_by_key(|s| (s.timestamp - t).num_milliseconds().abs())
}
