//! Service layer for the per-night pipeline.
//!
//! Services sit between the raw inputs (configuration, target records) and
//! the scheduler: they compute the night window, the altitude series, the
//! visibility decisions and the reference-star choice.

pub mod altitude;
pub mod ephemeris;
pub mod ingest;
pub mod night;
pub mod reference;
pub mod visibility;

pub use altitude::{AltitudeModel, HorizonProfile, SampleGrid};
pub use ephemeris::{LowPrecisionMoon, MoonEphemeris};
pub use ingest::{Ingest, IngestReport};
pub use night::{compute_night_window, observing_night_date, ObservingNight};
pub use reference::{
    BrightStarList, CatalogError, CatalogKind, CatalogQuery, NoReferenceReason, ReferenceMatcher,
    ReferenceOutcome, SlitMatching, StarCatalog, StarLookup, UserStarList,
};
pub use visibility::{SampleLimits, VisibilityRules};
