//! Reference star matching.
//!
//! Finds a comparison star for a target from the enabled catalog sources
//! and ranks the candidates by color similarity, then by distance or (with
//! the dome locked) by shared slit time. Every source failure degrades to a
//! logged fallback; "no reference" is an ordinary outcome.

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::ReferenceSettings;
use crate::models::{Coordinates, ReferenceCandidate, SlitWindow, Target};
use crate::services::altitude::{normalize_signed, AltitudeModel, SampleGrid};
use crate::services::visibility::{SampleLimits, VisibilityRules};

/// Failure of a catalog collaborator. Never escapes the matcher.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("catalog query failed: {0}")]
    QueryFailed(String),
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),
    #[error("lookup cancelled")]
    Cancelled,
}

/// Which configuration switch enables a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Remote,
    BrightStars,
    UserList,
}

/// Cone-and-magnitude query sent to every source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogQuery {
    pub center: Coordinates,
    pub radius_deg: f64,
    pub min_magnitude: f64,
    pub max_magnitude: f64,
}

impl CatalogQuery {
    pub fn accepts_magnitude(&self, magnitude: f64) -> bool {
        (self.min_magnitude..=self.max_magnitude).contains(&magnitude)
    }
}

/// Source of reference star candidates.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; sources are queried concurrently.
#[async_trait]
pub trait StarCatalog: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> CatalogKind;

    /// Candidates around `query.center`.
    ///
    /// # Returns
    /// * `Ok(Vec<ReferenceCandidate>)` - Matching stars, possibly empty
    /// * `Err(CatalogError)` - If the source could not answer
    async fn query(&self, query: &CatalogQuery) -> Result<Vec<ReferenceCandidate>, CatalogError>;
}

/// Star-by-position lookup used to find a target's color index.
#[async_trait]
pub trait StarLookup: Send + Sync {
    /// B-V color of the star at `coordinates`, `Ok(None)` when unknown.
    async fn color_index(&self, coordinates: &Coordinates) -> Result<Option<f64>, CatalogError>;
}

/// Static list of bright single stars, filtered by radius and magnitude.
#[derive(Debug, Clone, Default)]
pub struct BrightStarList {
    stars: Vec<ReferenceCandidate>,
}

impl BrightStarList {
    pub fn new(stars: Vec<ReferenceCandidate>) -> Self {
        Self { stars }
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }
}

#[async_trait]
impl StarCatalog for BrightStarList {
    fn name(&self) -> &str {
        "bright stars"
    }

    fn kind(&self) -> CatalogKind {
        CatalogKind::BrightStars
    }

    async fn query(&self, query: &CatalogQuery) -> Result<Vec<ReferenceCandidate>, CatalogError> {
        Ok(self
            .stars
            .iter()
            .filter(|s| query.accepts_magnitude(s.magnitude))
            .filter(|s| s.coordinates.separation_deg(&query.center) <= query.radius_deg)
            .cloned()
            .collect())
    }
}

/// User-supplied list, filtered by an RA/Dec box around the target.
#[derive(Debug, Clone, Default)]
pub struct UserStarList {
    stars: Vec<ReferenceCandidate>,
}

impl UserStarList {
    pub fn new(stars: Vec<ReferenceCandidate>) -> Self {
        Self { stars }
    }

    fn in_box(center: &Coordinates, half_size_deg: f64, star: &Coordinates) -> bool {
        if (star.dec_deg - center.dec_deg).abs() > half_size_deg {
            return false;
        }
        let cos_dec = center.dec_deg.to_radians().cos().max(1e-6);
        let half_ra = (half_size_deg / cos_dec).min(180.0);
        normalize_signed(star.ra_deg - center.ra_deg).abs() <= half_ra
    }
}

#[async_trait]
impl StarCatalog for UserStarList {
    fn name(&self) -> &str {
        "user list"
    }

    fn kind(&self) -> CatalogKind {
        CatalogKind::UserList
    }

    async fn query(&self, query: &CatalogQuery) -> Result<Vec<ReferenceCandidate>, CatalogError> {
        Ok(self
            .stars
            .iter()
            .filter(|s| query.accepts_magnitude(s.magnitude))
            .filter(|s| Self::in_box(&query.center, query.radius_deg, &s.coordinates))
            .cloned()
            .collect())
    }
}

/// Why no reference star was attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoReferenceReason {
    NoSources,
    NoCandidates,
    NoSlitOverlap,
    Cancelled,
}

impl std::fmt::Display for NoReferenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSources => write!(f, "no reference source enabled"),
            Self::NoCandidates => write!(f, "no candidate in the search window"),
            Self::NoSlitOverlap => write!(f, "no candidate passes through the dome slit"),
            Self::Cancelled => write!(f, "search cancelled"),
        }
    }
}

/// Result of a reference search.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceOutcome {
    Found {
        reference: ReferenceCandidate,
        /// All survivors in rank order, `reference` first
        candidates: Vec<ReferenceCandidate>,
    },
    NotFound(NoReferenceReason),
}

impl ReferenceOutcome {
    pub fn reference(&self) -> Option<&ReferenceCandidate> {
        match self {
            Self::Found { reference, .. } => Some(reference),
            Self::NotFound(_) => None,
        }
    }
}

/// Run `fut` bounded by `timeout` and aborted by `cancel`.
async fn bounded<T, F>(fut: F, timeout: Duration, cancel: &CancellationToken) -> Result<T, CatalogError>
where
    F: Future<Output = Result<T, CatalogError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(CatalogError::Cancelled),
        result = tokio::time::timeout(timeout, fut) => match result {
            Ok(inner) => inner,
            Err(_) => Err(CatalogError::Timeout(timeout)),
        },
    }
}

/// Slit context for dome-locked matching.
#[derive(Debug, Clone)]
pub struct SlitMatching {
    pub model: Arc<AltitudeModel>,
    pub grid: Arc<SampleGrid>,
    pub rules: VisibilityRules,
    pub max_altitude: f64,
}

/// Ranks reference candidates for targets.
pub struct ReferenceMatcher {
    settings: ReferenceSettings,
    sources: Vec<Arc<dyn StarCatalog>>,
    lookup: Option<Arc<dyn StarLookup>>,
    slit: Option<SlitMatching>,
}

impl ReferenceMatcher {
    pub fn new(settings: ReferenceSettings) -> Self {
        Self {
            settings,
            sources: Vec::new(),
            lookup: None,
            slit: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn StarCatalog>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn StarLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Enable dome-locked ranking (only used when `rules.dome_locked`).
    pub fn with_slit_matching(mut self, slit: SlitMatching) -> Self {
        self.slit = Some(slit);
        self
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.lookup_timeout_secs)
    }

    fn enabled(&self, kind: CatalogKind) -> bool {
        match kind {
            CatalogKind::Remote => self.settings.use_remote_catalog,
            CatalogKind::BrightStars => self.settings.use_bright_stars,
            CatalogKind::UserList => self.settings.use_user_list,
        }
    }

    /// Target color: catalog value, then lookup, then the assumed color.
    pub async fn target_color(&self, target: &Target, cancel: &CancellationToken) -> f64 {
        if let Some(color) = target.color_index {
            return color;
        }
        let assumed = self.settings.assumed_color;
        let Some(lookup) = &self.lookup else {
            warn!("No color for '{}', assuming {:.2}", target.name, assumed);
            return assumed;
        };
        match bounded(lookup.color_index(&target.coordinates), self.timeout(), cancel).await {
            Ok(Some(color)) => color,
            Ok(None) => {
                warn!("Lookup has no color for '{}', assuming {:.2}", target.name, assumed);
                assumed
            }
            Err(e) => {
                warn!("Color lookup for '{}' failed ({}), assuming {:.2}", target.name, e, assumed);
                assumed
            }
        }
    }

    /// Magnitude window `[min(min_ref, mag - 1), max_ref]`.
    pub fn magnitude_window(&self, target: &Target) -> (f64, f64) {
        let magnitude = target.primary_magnitude();
        let min = if magnitude > 0.0 {
            self.settings.min_ref_mag.min(magnitude - 1.0)
        } else {
            self.settings.min_ref_mag
        };
        (min, self.settings.max_ref_mag)
    }

    /// Union of all enabled sources; failed sources contribute nothing.
    async fn gather(
        &self,
        query: &CatalogQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReferenceCandidate>, CatalogError> {
        let sources: Vec<&Arc<dyn StarCatalog>> =
            self.sources.iter().filter(|s| self.enabled(s.kind())).collect();
        let timeout = self.timeout();
        let results = join_all(
            sources
                .iter()
                .map(|s| bounded(s.query(query), timeout, cancel)),
        )
        .await;

        let mut candidates: Vec<ReferenceCandidate> = Vec::new();
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(found) => {
                    debug!("{} returned {} candidates", source.name(), found.len());
                    for candidate in found {
                        let duplicate = candidates.iter().any(|c| {
                            c.name == candidate.name
                                || c.coordinates.separation_deg(&candidate.coordinates) < 1.0 / 3600.0
                        });
                        if !duplicate {
                            candidates.push(candidate);
                        }
                    }
                }
                Err(CatalogError::Cancelled) => return Err(CatalogError::Cancelled),
                Err(e) => warn!("Reference source '{}' failed: {}", source.name(), e),
            }
        }
        Ok(candidates)
    }

    /// Find the best reference star for `target`.
    pub async fn find_reference(&self, target: &Target, cancel: &CancellationToken) -> ReferenceOutcome {
        if !self.sources.iter().any(|s| self.enabled(s.kind())) {
            debug!("No reference source enabled for '{}'", target.name);
            return ReferenceOutcome::NotFound(NoReferenceReason::NoSources);
        }

        let color = self.target_color(target, cancel).await;
        if cancel.is_cancelled() {
            return ReferenceOutcome::NotFound(NoReferenceReason::Cancelled);
        }
        let (min_magnitude, max_magnitude) = self.magnitude_window(target);
        let query = CatalogQuery {
            center: target.coordinates,
            radius_deg: self.settings.search_radius_deg,
            min_magnitude,
            max_magnitude,
        };

        let candidates = match self.gather(&query, cancel).await {
            Ok(c) => c,
            Err(_) => {
                info!("Reference search for '{}' cancelled", target.name);
                return ReferenceOutcome::NotFound(NoReferenceReason::Cancelled);
            }
        };
        let candidates: Vec<ReferenceCandidate> = candidates
            .into_iter()
            .filter(|c| query.accepts_magnitude(c.magnitude))
            .map(|c| c.measured_from(&target.coordinates))
            // the target itself may be listed
            .filter(|c| c.distance_deg > 1.0 / 3600.0)
            .collect();
        if candidates.is_empty() {
            info!("No reference candidates for '{}'", target.name);
            return ReferenceOutcome::NotFound(NoReferenceReason::NoCandidates);
        }

        let ranked = match &self.slit {
            Some(slit) if slit.rules.dome_locked => {
                let ranked = self.rank_locked(target, color, candidates, slit);
                if ranked.is_empty() {
                    info!("No reference for '{}' passes through the slit", target.name);
                    return ReferenceOutcome::NotFound(NoReferenceReason::NoSlitOverlap);
                }
                ranked
            }
            _ => rank_by_color_and_distance(color, candidates),
        };

        let reference = ranked[0].clone();
        info!(
            "Reference for '{}': {} (mag {:.2}, B-V {:.2}, {:.2}° away)",
            target.name, reference.name, reference.magnitude, reference.color_index, reference.distance_deg
        );
        ReferenceOutcome::Found {
            reference,
            candidates: ranked,
        }
    }

    fn rank_locked(
        &self,
        target: &Target,
        color: f64,
        candidates: Vec<ReferenceCandidate>,
        slit: &SlitMatching,
    ) -> Vec<ReferenceCandidate> {
        let limits = SampleLimits::for_target(target, slit.max_altitude);
        let with_slit: Vec<ReferenceCandidate> = candidates
            .into_iter()
            .filter_map(|c| {
                let series = slit.model.series_on_grid(&c.coordinates, &slit.grid);
                let slit_series = slit.rules.slit_series(&series, &limits);
                let window = SlitWindow::from_samples(&slit_series, slit.grid.step())?;
                Some(c.with_slit_series(slit_series, Some(window)))
            })
            .collect();
        rank_by_color_and_slit(color, with_slit, self.settings.dwell_fraction)
    }
}

impl std::fmt::Debug for ReferenceMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceMatcher")
            .field("settings", &self.settings)
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("has_lookup", &self.lookup.is_some())
            .finish_non_exhaustive()
    }
}

/// Dome free: color distance, then angular distance.
pub fn rank_by_color_and_distance(color: f64, mut candidates: Vec<ReferenceCandidate>) -> Vec<ReferenceCandidate> {
    candidates.sort_by(|a, b| {
        a.color_distance(color)
            .total_cmp(&b.color_distance(color))
            .then_with(|| a.distance_deg.total_cmp(&b.distance_deg))
    });
    candidates
}

/// Dome locked: keep dwell >= `fraction` of the longest, then color
/// distance, then earliest slit entry.
pub fn rank_by_color_and_slit(
    color: f64,
    candidates: Vec<ReferenceCandidate>,
    fraction: f64,
) -> Vec<ReferenceCandidate> {
    let dwell = |c: &ReferenceCandidate| c.slit_window.map(|w| w.dwell_secs).unwrap_or(0);
    let max_dwell = candidates.iter().map(dwell).max().unwrap_or(0);
    if max_dwell == 0 {
        return Vec::new();
    }
    let mut kept: Vec<ReferenceCandidate> = candidates
        .into_iter()
        .filter(|c| dwell(c) as f64 >= fraction * max_dwell as f64)
        .collect();
    kept.sort_by(|a, b| {
        a.color_distance(color)
            .total_cmp(&b.color_distance(color))
            .then_with(|| {
                let start = |c: &ReferenceCandidate| c.slit_window.map(|w| w.start);
                start(a).cmp(&start(b))
            })
    });
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{GeographicLocation, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn target() -> Target {
        let mut t = Target::new("STF 1523", Coordinates::new(169.545, 31.529));
        t.magnitude_1 = 4.3;
        t.magnitude_2 = 4.8;
        t.color_index = Some(0.65);
        t
    }

    fn star(name: &str, ra: f64, dec: f64, mag: f64, color: f64) -> ReferenceCandidate {
        ReferenceCandidate::new(name, Coordinates::new(ra, dec), mag, color)
    }

    struct FailingCatalog;

    #[async_trait]
    impl StarCatalog for FailingCatalog {
        fn name(&self) -> &str {
            "failing"
        }
        fn kind(&self) -> CatalogKind {
            CatalogKind::Remote
        }
        async fn query(&self, _query: &CatalogQuery) -> Result<Vec<ReferenceCandidate>, CatalogError> {
            Err(CatalogError::QueryFailed("503".into()))
        }
    }

    struct SlowCatalog;

    #[async_trait]
    impl StarCatalog for SlowCatalog {
        fn name(&self) -> &str {
            "slow"
        }
        fn kind(&self) -> CatalogKind {
            CatalogKind::Remote
        }
        async fn query(&self, _query: &CatalogQuery) -> Result<Vec<ReferenceCandidate>, CatalogError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    struct FixedColor(Option<f64>);

    #[async_trait]
    impl StarLookup for FixedColor {
        async fn color_index(&self, _c: &Coordinates) -> Result<Option<f64>, CatalogError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn test_closer_color_beats_closer_distance() {
        let list = BrightStarList::new(vec![
            star("blue", 170.5, 31.5, 6.5, 0.5),
            star("red", 169.8, 31.5, 6.5, 0.9),
        ]);
        let matcher = ReferenceMatcher::new(ReferenceSettings::default()).with_source(Arc::new(list));
        let outcome = matcher.find_reference(&target(), &CancellationToken::new()).await;
        assert_eq!(outcome.reference().unwrap().name, "blue");
    }

    #[tokio::test]
    async fn test_equal_color_prefers_nearer() {
        let list = BrightStarList::new(vec![
            star("far", 172.0, 31.5, 7.0, 0.6),
            star("near", 170.0, 31.5, 7.0, 0.7),
        ]);
        let matcher = ReferenceMatcher::new(ReferenceSettings::default()).with_source(Arc::new(list));
        let outcome = matcher.find_reference(&target(), &CancellationToken::new()).await;
        assert_eq!(outcome.reference().unwrap().name, "near");
    }

    #[tokio::test]
    async fn test_failed_source_degrades_to_not_found() {
        let matcher =
            ReferenceMatcher::new(ReferenceSettings::default()).with_source(Arc::new(FailingCatalog));
        let outcome = matcher.find_reference(&target(), &CancellationToken::new()).await;
        assert_eq!(outcome, ReferenceOutcome::NotFound(NoReferenceReason::NoCandidates));
    }

    #[tokio::test]
    async fn test_failed_source_does_not_hide_others() {
        let list = BrightStarList::new(vec![star("ok", 170.0, 31.0, 7.0, 0.6)]);
        let matcher = ReferenceMatcher::new(ReferenceSettings::default())
            .with_source(Arc::new(FailingCatalog))
            .with_source(Arc::new(list));
        let outcome = matcher.find_reference(&target(), &CancellationToken::new()).await;
        assert_eq!(outcome.reference().unwrap().name, "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let mut settings = ReferenceSettings::default();
        settings.lookup_timeout_secs = 1;
        let list = BrightStarList::new(vec![star("ok", 170.0, 31.0, 7.0, 0.6)]);
        let matcher = ReferenceMatcher::new(settings)
            .with_source(Arc::new(SlowCatalog))
            .with_source(Arc::new(list));
        let outcome = matcher.find_reference(&target(), &CancellationToken::new()).await;
        assert_eq!(outcome.reference().unwrap().name, "ok");
    }

    #[tokio::test]
    async fn test_cancelled_search_returns_not_found() {
        let matcher =
            ReferenceMatcher::new(ReferenceSettings::default()).with_source(Arc::new(SlowCatalog));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = matcher.find_reference(&target(), &cancel).await;
        assert_eq!(outcome, ReferenceOutcome::NotFound(NoReferenceReason::Cancelled));
    }

    #[tokio::test]
    async fn test_disabled_sources_are_skipped() {
        let list = UserStarList::new(vec![star("user", 170.0, 31.0, 7.0, 0.6)]);
        let matcher = ReferenceMatcher::new(ReferenceSettings::default()).with_source(Arc::new(list));
        let outcome = matcher.find_reference(&target(), &CancellationToken::new()).await;
        assert_eq!(outcome, ReferenceOutcome::NotFound(NoReferenceReason::NoSources));
    }

    #[tokio::test]
    async fn test_color_fallbacks() {
        let mut t = target();
        t.color_index = None;
        let cancel = CancellationToken::new();

        let plain = ReferenceMatcher::new(ReferenceSettings::default());
        assert_eq!(plain.target_color(&t, &cancel).await, 0.65);

        let known = ReferenceMatcher::new(ReferenceSettings::default())
            .with_lookup(Arc::new(FixedColor(Some(1.1))));
        assert_eq!(known.target_color(&t, &cancel).await, 1.1);

        let unknown = ReferenceMatcher::new(ReferenceSettings::default())
            .with_lookup(Arc::new(FixedColor(None)));
        assert_eq!(unknown.target_color(&t, &cancel).await, 0.65);
    }

    #[test]
    fn test_magnitude_window() {
        let matcher = ReferenceMatcher::new(ReferenceSettings::default());
        // primary 4.3: window opens down to 3.3
        let (min, max) = matcher.magnitude_window(&target());
        assert!((min - 3.3).abs() < 1e-9);
        assert_eq!(max, 10.0);
        let mut faint = target();
        faint.magnitude_1 = 9.0;
        faint.magnitude_2 = 9.5;
        assert_eq!(matcher.magnitude_window(&faint), (6.0, 10.0));
    }

    #[tokio::test]
    async fn test_user_list_box() {
        let list = UserStarList::new(vec![
            star("inside", 175.0, 33.0, 7.0, 0.6),
            star("outside dec", 170.0, 40.0, 7.0, 0.6),
            star("outside ra", 180.0, 31.0, 7.0, 0.6),
        ]);
        let query = CatalogQuery {
            center: Coordinates::new(169.545, 31.529),
            radius_deg: 5.0,
            min_magnitude: 3.0,
            max_magnitude: 10.0,
        };
        let found = list.query(&query).await.unwrap();
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["inside"]);
    }

    #[test]
    fn test_locked_ranking_keeps_long_dwell() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 2, 4, 0, 0).unwrap();
        let window = |minutes: i64, secs: i64| {
            Some(SlitWindow {
                start: t0 + chrono::Duration::minutes(minutes),
                dwell_secs: secs,
            })
        };
        let mut short = star("short", 1.0, 1.0, 7.0, 0.65);
        short.slit_window = window(0, 600);
        let mut late = star("late", 2.0, 1.0, 7.0, 0.70);
        late.slit_window = window(30, 3000);
        let mut early = star("early", 3.0, 1.0, 7.0, 0.70);
        early.slit_window = window(10, 2400);

        let ranked = rank_by_color_and_slit(0.65, vec![short, late, early], 0.7);
        let names: Vec<&str> = ranked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn test_locked_matching_computes_slit_windows() {
        let observer = GeographicLocation::new(32.0, -110.0, None).unwrap();
        let model = Arc::new(AltitudeModel::new(observer));
        let night = TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 3, 2, 2, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 12, 30, 0).unwrap(),
        )
        .unwrap();
        let grid = Arc::new(model.grid(&night, 0.05));
        let rules = VisibilityRules {
            night,
            dome_azimuth: 180.0,
            slit_width: 30.0,
            dome_locked: true,
            max_altitude: 90.0,
            min_moon_distance: 20.0,
            meridian_margin: 0.0,
            rounding_minutes: 5,
        };
        let list = BrightStarList::new(vec![
            star("transiting", 170.0, 20.0, 7.0, 0.6),
            // never rises high enough
            star("south", 170.0, -70.0, 7.0, 0.65),
        ]);
        let mut settings = ReferenceSettings::default();
        settings.search_radius_deg = 120.0;
        let matcher = ReferenceMatcher::new(settings)
            .with_source(Arc::new(list))
            .with_slit_matching(SlitMatching {
                model,
                grid,
                rules,
                max_altitude: 90.0,
            });
        let mut t = target();
        t.min_altitude_deg = 30.0;
        let outcome = matcher.find_reference(&t, &CancellationToken::new()).await;
        let reference = outcome.reference().unwrap();
        assert_eq!(reference.name, "transiting");
        assert!(reference.slit_window.is_some());
        assert!(!reference.slit_series.is_empty());
    }
}
