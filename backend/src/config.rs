//! Scheduler configuration file support.
//!
//! All engine defaults live in one immutable `SchedulerConfig` that is read
//! from TOML and handed to the ingest, selector and matcher constructors.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::GeographicLocation;
use crate::error::{ErrorContext, SchedulerError, SchedulerResult};

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub observer: ObserverSettings,
    #[serde(default)]
    pub night: NightSettings,
    #[serde(default)]
    pub dome: DomeSettings,
    #[serde(default)]
    pub limits: LimitSettings,
    #[serde(default)]
    pub defaults: TargetDefaults,
    #[serde(default)]
    pub reference: ReferenceSettings,
    #[serde(default)]
    pub scheduler: SelectorSettings,
}

/// Observer site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverSettings {
    #[serde(default)]
    pub latitude: f64,
    /// East positive
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub elevation_m: f64,
    /// Local civil time offset, used to name the observing night
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Custom horizon as `[azimuth, min_altitude]` points
    #[serde(default)]
    pub horizon: Vec<[f64; 2]>,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            elevation_m: 0.0,
            utc_offset_minutes: 0,
            horizon: Vec::new(),
        }
    }
}

impl ObserverSettings {
    pub fn location(&self) -> SchedulerResult<GeographicLocation> {
        GeographicLocation::new(self.latitude, self.longitude, Some(self.elevation_m)).map_err(
            |e| {
                SchedulerError::configuration_with_context(
                    e,
                    ErrorContext::new("observer_location"),
                )
            },
        )
    }
}

/// Night window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightSettings {
    /// Extension of the altitude series before and after twilight
    #[serde(default = "default_margin_minutes")]
    pub margin_minutes: i64,
    /// Sun altitude bounding the night (nautical twilight)
    #[serde(default = "default_twilight_altitude")]
    pub twilight_sun_altitude: f64,
}

fn default_margin_minutes() -> i64 {
    60
}

fn default_twilight_altitude() -> f64 {
    -12.0
}

impl Default for NightSettings {
    fn default() -> Self {
        Self {
            margin_minutes: default_margin_minutes(),
            twilight_sun_altitude: default_twilight_altitude(),
        }
    }
}

/// Dome and sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomeSettings {
    #[serde(default = "default_dome_azimuth")]
    pub azimuth: f64,
    #[serde(default = "default_slit_width")]
    pub slit_width: f64,
    /// Dome parked at `azimuth` for the whole night
    #[serde(default)]
    pub locked: bool,
    /// Slits narrower than this get the fine sampling step
    #[serde(default = "default_narrow_slit")]
    pub narrow_slit_threshold: f64,
    #[serde(default = "default_fine_step")]
    pub fine_step_hours: f64,
    #[serde(default = "default_coarse_step")]
    pub coarse_step_hours: f64,
}

fn default_dome_azimuth() -> f64 {
    180.0
}

fn default_slit_width() -> f64 {
    30.0
}

fn default_narrow_slit() -> f64 {
    20.0
}

fn default_fine_step() -> f64 {
    0.01
}

fn default_coarse_step() -> f64 {
    0.05
}

impl Default for DomeSettings {
    fn default() -> Self {
        Self {
            azimuth: default_dome_azimuth(),
            slit_width: default_slit_width(),
            locked: false,
            narrow_slit_threshold: default_narrow_slit(),
            fine_step_hours: default_fine_step(),
            coarse_step_hours: default_coarse_step(),
        }
    }
}

impl DomeSettings {
    /// Series step in hours for this slit.
    pub fn step_hours(&self) -> f64 {
        if self.slit_width < self.narrow_slit_threshold {
            self.fine_step_hours
        } else {
            self.coarse_step_hours
        }
    }
}

/// Acceptance limits applied during ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitSettings {
    /// Arcseconds
    #[serde(default)]
    pub min_separation: f64,
    #[serde(default = "default_max_separation")]
    pub max_separation: f64,
    #[serde(default)]
    pub min_magnitude: f64,
    #[serde(default = "default_max_magnitude")]
    pub max_magnitude: f64,
    #[serde(default = "default_max_altitude")]
    pub max_altitude: f64,
    #[serde(default = "default_min_moon_distance")]
    pub min_moon_distance: f64,
    /// Hour angle band around transit avoided when the dome is free
    #[serde(default)]
    pub meridian_margin: f64,
}

fn default_max_separation() -> f64 {
    10.0
}

fn default_max_magnitude() -> f64 {
    12.0
}

fn default_max_altitude() -> f64 {
    90.0
}

fn default_min_moon_distance() -> f64 {
    20.0
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            min_separation: 0.0,
            max_separation: default_max_separation(),
            min_magnitude: 0.0,
            max_magnitude: default_max_magnitude(),
            max_altitude: default_max_altitude(),
            min_moon_distance: default_min_moon_distance(),
            meridian_margin: 0.0,
        }
    }
}

/// Values substituted for optional target-file columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDefaults {
    #[serde(default = "default_one")]
    pub cycles: u32,
    #[serde(default = "default_one")]
    pub nights: u32,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default = "default_reference_template")]
    pub reference_template: String,
    #[serde(default = "default_min_altitude")]
    pub min_altitude: f64,
    #[serde(default)]
    pub airmass_min: f64,
    #[serde(default = "default_airmass_max")]
    pub airmass_max: f64,
    #[serde(default = "default_true")]
    pub get_reference: bool,
    #[serde(default = "default_exposure_time")]
    pub exposure_time_secs: f64,
    #[serde(default = "default_exposure_count")]
    pub exposure_count: u32,
    #[serde(default)]
    pub filter: String,
}

fn default_one() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_template() -> String {
    "Speckle Target".to_string()
}

fn default_reference_template() -> String {
    "Speckle Reference".to_string()
}

fn default_min_altitude() -> f64 {
    30.0
}

fn default_airmass_max() -> f64 {
    4.0
}

fn default_exposure_time() -> f64 {
    0.05
}

fn default_exposure_count() -> u32 {
    1000
}

impl Default for TargetDefaults {
    fn default() -> Self {
        Self {
            cycles: default_one(),
            nights: default_one(),
            template: default_template(),
            reference_template: default_reference_template(),
            min_altitude: default_min_altitude(),
            airmass_min: 0.0,
            airmass_max: default_airmass_max(),
            get_reference: true,
            exposure_time_secs: default_exposure_time(),
            exposure_count: default_exposure_count(),
            filter: String::new(),
        }
    }
}

/// Reference star search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSettings {
    #[serde(default = "default_min_ref_mag")]
    pub min_ref_mag: f64,
    #[serde(default = "default_max_ref_mag")]
    pub max_ref_mag: f64,
    #[serde(default = "default_search_radius")]
    pub search_radius_deg: f64,
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,
    /// Color used when neither the catalog nor a lookup provides one
    #[serde(default = "default_assumed_color")]
    pub assumed_color: f64,
    /// Dome-locked matching keeps candidates with dwell >= fraction * max dwell
    #[serde(default = "default_dwell_fraction")]
    pub dwell_fraction: f64,
    #[serde(default = "default_true")]
    pub use_remote_catalog: bool,
    #[serde(default = "default_true")]
    pub use_bright_stars: bool,
    #[serde(default)]
    pub use_user_list: bool,
}

fn default_min_ref_mag() -> f64 {
    6.0
}

fn default_max_ref_mag() -> f64 {
    10.0
}

fn default_search_radius() -> f64 {
    5.0
}

fn default_lookup_timeout() -> u64 {
    30
}

fn default_assumed_color() -> f64 {
    0.65
}

fn default_dwell_fraction() -> f64 {
    0.7
}

impl Default for ReferenceSettings {
    fn default() -> Self {
        Self {
            min_ref_mag: default_min_ref_mag(),
            max_ref_mag: default_max_ref_mag(),
            search_radius_deg: default_search_radius(),
            lookup_timeout_secs: default_lookup_timeout(),
            assumed_color: default_assumed_color(),
            dwell_fraction: default_dwell_fraction(),
            use_remote_catalog: true,
            use_bright_stars: true,
            use_user_list: false,
        }
    }
}

/// Selector timing rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSettings {
    #[serde(default = "default_cooldown")]
    pub reimage_cooldown_minutes: i64,
    /// Image times this close to now are moved to now
    #[serde(default = "default_five")]
    pub snap_window_minutes: i64,
    /// Secondary tier still admits image times this far in the past
    #[serde(default = "default_five")]
    pub late_admission_minutes: i64,
    #[serde(default = "default_rounding")]
    pub image_time_rounding_minutes: u32,
    #[serde(default)]
    pub filler_enabled: bool,
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

fn default_cooldown() -> i64 {
    15
}

fn default_five() -> i64 {
    5
}

fn default_rounding() -> u32 {
    5
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            reimage_cooldown_minutes: default_cooldown(),
            snap_window_minutes: default_five(),
            late_admission_minutes: default_five(),
            image_time_rounding_minutes: default_rounding(),
            filler_enabled: false,
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SchedulerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SchedulerError::io(e, ErrorContext::new("load_config").with_path(path.display()))
        })?;
        Self::from_toml_str(&content).map_err(|e| e.with_operation("load_config"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> SchedulerResult<Self> {
        let config: SchedulerConfig = toml::from_str(content).map_err(|e| {
            SchedulerError::configuration(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> SchedulerResult<()> {
        self.observer.location()?;
        if self.dome.slit_width <= 0.0 || self.dome.slit_width > 360.0 {
            return Err(SchedulerError::configuration(format!(
                "dome.slit_width must be in (0, 360], got {}",
                self.dome.slit_width
            )));
        }
        if self.dome.fine_step_hours <= 0.0 || self.dome.coarse_step_hours <= 0.0 {
            return Err(SchedulerError::configuration(
                "dome step sizes must be positive",
            ));
        }
        if self.limits.min_separation > self.limits.max_separation {
            return Err(SchedulerError::configuration(
                "limits.min_separation exceeds limits.max_separation",
            ));
        }
        if self.limits.min_magnitude > self.limits.max_magnitude {
            return Err(SchedulerError::configuration(
                "limits.min_magnitude exceeds limits.max_magnitude",
            ));
        }
        if !(0.0..=1.0).contains(&self.reference.dwell_fraction) {
            return Err(SchedulerError::configuration(
                "reference.dwell_fraction must be within [0, 1]",
            ));
        }
        Ok(())
    }
}
