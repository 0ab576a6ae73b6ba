use serde::{Deserialize, Serialize};

use super::coordinates::Coordinates;
use super::sample::{AltitudeSample, SlitWindow};

/// A comparison star offered by a catalog source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCandidate {
    pub name: String,
    pub coordinates: Coordinates,
    pub magnitude: f64,
    /// B-V color index
    pub color_index: f64,
    /// Angular distance to the target, degrees
    pub distance_deg: f64,
    /// Samples inside the dome slit; only filled in dome-locked matching
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slit_series: Vec<AltitudeSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slit_window: Option<SlitWindow>,
}

impl ReferenceCandidate {
    pub fn new(
        name: impl Into<String>,
        coordinates: Coordinates,
        magnitude: f64,
        color_index: f64,
    ) -> Self {
        Self {
            name: name.into(),
            coordinates,
            magnitude,
            color_index,
            distance_deg: 0.0,
            slit_series: Vec::new(),
            slit_window: None,
        }
    }

    /// Copy with `distance_deg` measured from `target`.
    pub fn measured_from(mut self, target: &Coordinates) -> Self {
        self.distance_deg = self.coordinates.separation_deg(target);
        self
    }

    /// Copy carrying a dome-slit sub-series and its window.
    pub fn with_slit_series(mut self, series: Vec<AltitudeSample>, window: Option<SlitWindow>) -> Self {
        self.slit_series = series;
        self.slit_window = window;
        self
    }

    pub fn color_distance(&self, color: f64) -> f64 {
        (self.color_index - color).abs()
    }
}
