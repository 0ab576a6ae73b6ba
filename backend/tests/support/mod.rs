//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use speckle_scheduler::config::SchedulerConfig;
use speckle_scheduler::models::{Coordinates, ReferenceCandidate};
use speckle_scheduler::services::{CatalogError, CatalogKind, CatalogQuery, StarCatalog};

/// Tucson-like site, dome free, Moon distance ignored.
pub const CONFIG_TOML: &str = r#"
[observer]
latitude = 32.0
longitude = -110.0
elevation_m = 2100.0
utc_offset_minutes = -420

[night]
margin_minutes = 60

[dome]
azimuth = 180.0
slit_width = 30.0

[limits]
min_separation = 0.1
max_separation = 10.0
max_magnitude = 12.0
min_moon_distance = 0.0

[defaults]
min_altitude = 30.0
template = "Speckle Target"

[reference]
use_remote_catalog = true
use_bright_stars = true
"#;

/// Five rows: one imageable, one too wide, one without coordinates, one
/// below the horizon all night, one with its nights already done.
pub const TARGETS_CSV: &str = "\
name;ra;dec;mag1;mag2;sep;nights;cycles;completed_nights;priority
STF 1523;11 18 10.9;+31 31 45;4.3;4.8;1.9;2;2;0;1
STF 1110;07 34 35.9;+31 53 18;1.9;3.0;25.0;1;1;0;0
ANON;;;8.0;8.5;1.0;1;1;0;0
HJ 4486;12 00 00;-80 00 00;6.0;7.0;2.0;1;1;0;0
STF 1338;09 21 00;+38 11 00;6.7;7.1;1.1;1;1;1;0
";

/// A two-night pair observed once per night, and a target that never rises.
pub const TWO_NIGHTS_CSV: &str = "\
name;ra;dec;mag1;mag2;sep;nights;cycles
STF 1523;11 18 10.9;+31 31 45;4.3;4.8;1.9;2;1
HJ 4486;12 00 00;-80 00 00;6.0;7.0;2.0;1;1
";

pub fn config() -> SchedulerConfig {
    SchedulerConfig::from_toml_str(CONFIG_TOML).unwrap()
}

pub fn night_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

/// Local evening on the night of 2024-03-02, before dusk.
pub fn next_evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 3, 0, 30, 0).unwrap()
}

/// Local evening on the night of 2024-03-01, before dusk.
pub fn evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 2, 0, 30, 0).unwrap()
}

pub fn star(name: &str, ra: f64, dec: f64, magnitude: f64, color: f64) -> ReferenceCandidate {
    ReferenceCandidate::new(name, Coordinates::new(ra, dec), magnitude, color)
}

/// Remote catalog stand-in that counts its queries and may stall.
pub struct FakeRemoteCatalog {
    pub stars: Vec<ReferenceCandidate>,
    pub delay: Option<Duration>,
    pub queries: AtomicUsize,
}

impl FakeRemoteCatalog {
    pub fn new(stars: Vec<ReferenceCandidate>) -> Self {
        Self {
            stars,
            delay: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn stalled(delay: Duration) -> Self {
        Self {
            stars: Vec::new(),
            delay: Some(delay),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StarCatalog for FakeRemoteCatalog {
    fn name(&self) -> &str {
        "fake remote"
    }

    fn kind(&self) -> CatalogKind {
        CatalogKind::Remote
    }

    async fn query(&self, query: &CatalogQuery) -> Result<Vec<ReferenceCandidate>, CatalogError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .stars
            .iter()
            .filter(|s| s.coordinates.separation_deg(&query.center) <= query.radius_deg)
            .cloned()
            .collect())
    }
}
