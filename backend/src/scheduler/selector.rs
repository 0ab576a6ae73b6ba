//! The "what next" decision.
//!
//! `select_next` is a pure function of the state, the target list and the
//! current time. Tiers are tried in order and each only when the previous
//! one found nothing:
//!
//! 1. primary: eligible targets whose dome-slit window is still ahead,
//!    earliest slit entry first;
//! 2. secondary: eligible targets whose image time is not more than
//!    `late_admission_minutes` in the past, fewest completed cycles first,
//!    then earliest image time;
//! 3. filler (when enabled): the first cached filler above its minimum
//!    altitude right now.
//!
//! Repeated calls without a completion in between return the dispatched
//! target again.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};

use super::state::{Dispatch, SchedulerPhase, SchedulerState, SelectionTier};
use crate::api::TargetId;
use crate::config::SelectorSettings;
use crate::models::{sample_nearest, Target};

/// Fillers are only considered when a sample lies this close to now.
const FILLER_SAMPLE_TOLERANCE_MINUTES: i64 = 10;

/// A target handed to the executor.
#[derive(Debug, Clone)]
pub struct Selection {
    pub target: Target,
    pub tier: SelectionTier,
    /// When to start; `now` if the image time was within the snap window
    pub image_time: DateTime<Utc>,
    pub snapped: bool,
}

/// Eligible for tiers 1 and 2: work left and not imaged within the cooldown.
pub fn is_eligible(target: &Target, now: DateTime<Utc>, settings: &SelectorSettings) -> bool {
    target.has_work_left()
        && !target.imaged_within(now, Duration::minutes(settings.reimage_cooldown_minutes))
}

/// Image time, or `now` when it lies within the snap window (or has passed).
pub fn snap_image_time(
    image_time: DateTime<Utc>,
    now: DateTime<Utc>,
    settings: &SelectorSettings,
) -> (DateTime<Utc>, bool) {
    if image_time - now <= Duration::minutes(settings.snap_window_minutes) {
        (now, image_time != now)
    } else {
        (image_time, false)
    }
}

fn primary<'a>(targets: &'a [Target], now: DateTime<Utc>, settings: &SelectorSettings) -> Option<&'a Target> {
    targets
        .iter()
        .filter(|t| is_eligible(t, now, settings))
        .filter(|t| !t.slit_series.is_empty())
        .filter_map(|t| t.slit_window.filter(|w| w.start > now).map(|w| (t, w.start)))
        .min_by_key(|(_, start)| *start)
        .map(|(t, _)| t)
}

fn secondary<'a>(
    targets: &'a [Target],
    now: DateTime<Utc>,
    settings: &SelectorSettings,
) -> Option<&'a Target> {
    let earliest = now - Duration::minutes(settings.late_admission_minutes);
    targets
        .iter()
        .filter(|t| is_eligible(t, now, settings))
        .filter_map(|t| t.image_time.filter(|it| *it > earliest).map(|it| (t, it)))
        .min_by_key(|(t, it)| (t.completed_cycles, *it))
        .map(|(t, _)| t)
}

/// Remove and return the first filler currently above its minimum altitude.
fn take_filler(state: &mut SchedulerState, now: DateTime<Utc>) -> Option<Target> {
    let tolerance = Duration::minutes(FILLER_SAMPLE_TOLERANCE_MINUTES);
    let position = state.fillers.iter().position(|f| {
        sample_nearest(&f.altitude_series, now)
            .map(|s| (s.timestamp - now).abs() <= tolerance && s.altitude_deg >= f.min_altitude_deg)
            .unwrap_or(false)
    })?;
    let mut filler = state.fillers.remove(position)?;
    filler.register = false;
    Some(filler)
}

fn find_dispatched<'a>(state: &'a SchedulerState, targets: &'a [Target], id: TargetId) -> Option<&'a Target> {
    targets
        .iter()
        .find(|t| t.id == id)
        .or_else(|| state.filler_in_flight.as_ref().filter(|f| f.id == id))
}

/// Pick the target to observe at `now`.
///
/// Returns `None` when nothing is eligible; the state is then `Exhausted`
/// until a later call finds something.
pub fn select_next(
    state: &mut SchedulerState,
    targets: &[Target],
    now: DateTime<Utc>,
    settings: &SelectorSettings,
) -> Option<Selection> {
    if let Some(dispatch) = state.current {
        match find_dispatched(state, targets, dispatch.id) {
            Some(target) => {
                debug!("'{}' is still dispatched", target.name);
                return Some(Selection {
                    target: target.clone(),
                    tier: dispatch.tier,
                    image_time: dispatch.image_time,
                    snapped: dispatch.snapped,
                });
            }
            None => {
                warn!(
                    "Dispatched target {} not found in the target list, selecting afresh",
                    dispatch.id
                );
                state.clear_current();
            }
        }
    }

    state.phase = SchedulerPhase::Selecting;
    let picked = primary(targets, now, settings)
        .map(|t| (t.clone(), SelectionTier::Primary))
        .or_else(|| secondary(targets, now, settings).map(|t| (t.clone(), SelectionTier::Secondary)));

    let (target, tier) = match picked {
        Some(picked) => picked,
        None if settings.filler_enabled => match take_filler(state, now) {
            Some(filler) => (filler, SelectionTier::Filler),
            None => return exhausted(state),
        },
        None => return exhausted(state),
    };

    let planned = match tier {
        SelectionTier::Filler => now,
        _ => target.image_time.unwrap_or(now),
    };
    let (image_time, snapped) = snap_image_time(planned, now, settings);
    if tier == SelectionTier::Filler {
        state.filler_in_flight = Some(target.clone());
    }
    state.current = Some(Dispatch {
        id: target.id,
        tier,
        image_time,
        snapped,
    });
    state.phase = SchedulerPhase::Dispatched;
    info!(
        "Selected '{}' ({} tier) for {}{}",
        target.name,
        tier,
        image_time.format("%H:%M:%S"),
        if snapped { " (snapped to now)" } else { "" }
    );
    Some(Selection {
        target,
        tier,
        image_time,
        snapped,
    })
}

fn exhausted(state: &mut SchedulerState) -> Option<Selection> {
    info!("No eligible target");
    state.phase = SchedulerPhase::Exhausted;
    None
}

/// Apply the completion of the dispatched target.
///
/// Registering targets get `imaged_at = now` and one more cycle (completing
/// the night when the cycle quota is reached); the whole update happens
/// here, under the caller's lock. Returns the id of the completed target.
pub fn complete_current(
    state: &mut SchedulerState,
    targets: &mut [Target],
    now: DateTime<Utc>,
) -> Option<TargetId> {
    let Some(dispatch) = state.current else {
        debug!("Completion reported with nothing dispatched");
        return None;
    };
    state.phase = SchedulerPhase::Completing;

    if let Some(target) = targets.iter_mut().find(|t| t.id == dispatch.id) {
        if target.record_observation(now) {
            if target.reference.is_some() {
                target.completed_reference_cycles += 1;
            }
            info!(
                "Completed '{}': cycle {}/{}, night {}/{}",
                target.name, target.completed_cycles, target.cycles, target.completed_nights, target.nights
            );
        } else {
            debug!("Completed '{}' (not registered)", target.name);
        }
    } else if state.filler_in_flight.as_ref().map(|f| f.id) == Some(dispatch.id) {
        debug!("Filler {} completed", dispatch.id);
    } else {
        warn!("Completed target {} is no longer in the target list", dispatch.id);
    }

    state.previous = Some(dispatch.id);
    state.clear_current();
    Some(dispatch.id)
}
