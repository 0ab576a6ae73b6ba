//! Night scheduler.
//!
//! `TargetScheduler` owns the target list and the selector state for one
//! night. Selection and completion run inside one critical section
//! (`parking_lot::Mutex`, never held across an `.await`); the reference
//! search runs outside it and its result is applied to the target by id in
//! a second, short critical section. Snapshots are rendered under the lock
//! and written after it is released.

pub mod plan;
pub mod selector;
pub mod state;

pub use plan::{ExecutionPlan, PlanBuilder, PlanStep, PlanTemplate};
pub use selector::{complete_current, select_next, Selection};
pub use state::{DomeState, SchedulerPhase, SchedulerState, SelectionTier};

use chrono::NaiveDate;
use log::{debug, info};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::api::TargetId;
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::error::SchedulerResult;
use crate::io::snapshot::render_snapshot;
use crate::io::SnapshotWriter;
use crate::models::Target;
use crate::services::night::ObservingNight;
use crate::services::reference::{ReferenceMatcher, ReferenceOutcome};

#[derive(Debug)]
struct Inner {
    targets: Vec<Target>,
    state: SchedulerState,
}

/// Stateful "next target" service for one observing night.
pub struct TargetScheduler {
    config: Arc<SchedulerConfig>,
    clock: Arc<dyn Clock>,
    night: ObservingNight,
    inner: Mutex<Inner>,
    matcher: Option<Arc<ReferenceMatcher>>,
    snapshots: Option<SnapshotWriter>,
}

impl TargetScheduler {
    pub fn new(
        config: Arc<SchedulerConfig>,
        clock: Arc<dyn Clock>,
        night: ObservingNight,
        targets: Vec<Target>,
    ) -> Self {
        let state = SchedulerState::new(night.window, DomeState::from(&config.dome));
        Self {
            config,
            clock,
            night,
            inner: Mutex::new(Inner { targets, state }),
            matcher: None,
            snapshots: None,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<ReferenceMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_snapshots(mut self, writer: SnapshotWriter) -> Self {
        self.snapshots = Some(writer);
        self
    }

    /// Filler candidates for the optional third tier.
    pub fn with_fillers(self, fillers: Vec<Target>) -> Self {
        self.inner.lock().state.fillers = fillers.into();
        self
    }

    pub fn night(&self) -> &ObservingNight {
        &self.night
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.inner.lock().state.phase
    }

    /// Id of the dispatched target.
    pub fn current(&self) -> Option<TargetId> {
        self.inner.lock().state.current.map(|d| d.id)
    }

    pub fn previous(&self) -> Option<TargetId> {
        self.inner.lock().state.previous
    }

    /// Copy of the target list.
    pub fn targets(&self) -> Vec<Target> {
        self.inner.lock().targets.clone()
    }

    pub fn target(&self, id: TargetId) -> Option<Target> {
        self.inner.lock().targets.iter().find(|t| t.id == id).cloned()
    }

    /// Select the target to observe now and attach a reference star to it.
    ///
    /// Cancelling `cancel` only aborts the reference search; the selection
    /// itself stands and the target is returned without a reference.
    pub async fn next_target(&self, cancel: &CancellationToken) -> Option<Selection> {
        let now = self.clock.now();
        let mut selection = {
            let mut inner = self.inner.lock();
            let Inner { targets, state } = &mut *inner;
            select_next(state, targets, now, &self.config.scheduler)?
        };

        let wants_reference = selection.tier != SelectionTier::Filler
            && selection.target.get_reference
            && selection.target.reference.is_none();
        let Some(matcher) = self.matcher.as_ref().filter(|_| wants_reference) else {
            return Some(selection);
        };

        match matcher.find_reference(&selection.target, cancel).await {
            ReferenceOutcome::Found {
                reference,
                candidates,
            } => {
                let mut inner = self.inner.lock();
                let still_dispatched =
                    inner.state.current.map(|d| d.id) == Some(selection.target.id);
                if let Some(target) = inner
                    .targets
                    .iter_mut()
                    .find(|t| t.id == selection.target.id)
                    .filter(|_| still_dispatched)
                {
                    target.reference = Some(reference.clone());
                    target.reference_candidates = candidates.clone();
                }
                selection.target.reference = Some(reference);
                selection.target.reference_candidates = candidates;
            }
            ReferenceOutcome::NotFound(reason) => {
                info!(
                    "Imaging '{}' without a reference star: {}",
                    selection.target.name, reason
                );
            }
        }
        Some(selection)
    }

    /// Record completion of the dispatched target and persist the snapshot.
    ///
    /// Returns the id of the completed target, `None` when nothing was
    /// dispatched. Counters are updated even when the snapshot write fails.
    pub fn register_completion(&self) -> SchedulerResult<Option<TargetId>> {
        let now = self.clock.now();
        let (completed, pending) = {
            let mut inner = self.inner.lock();
            let Inner { targets, state } = &mut *inner;
            let completed = complete_current(state, targets, now);
            let pending = match (&self.snapshots, completed) {
                (Some(writer), Some(_)) => Some((writer.ticket(), render_snapshot(targets))),
                _ => None,
            };
            (completed, pending)
        };

        if let (Some(writer), Some((ticket, content))) = (&self.snapshots, pending) {
            writer.write_rendered(ticket, self.night.date, &content?)?;
        }
        Ok(completed)
    }

    /// Abandon the dispatched target without counting it.
    pub fn cancel_current(&self) -> Option<TargetId> {
        let mut inner = self.inner.lock();
        let id = inner.state.current.map(|d| d.id);
        if let Some(id) = id {
            debug!("Dispatched target {} cancelled", id);
        }
        inner.state.clear_current();
        id
    }

    /// Plan builder using the configured template names.
    pub fn plan_builder(&self) -> PlanBuilder {
        PlanBuilder::new(
            PlanTemplate::named(self.config.defaults.template.clone()),
            PlanTemplate::named(self.config.defaults.reference_template.clone()),
        )
    }

    /// Where snapshots of this night go, if enabled.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshots.as_ref().map(|w| w.path_for(self.night.date))
    }

    pub fn night_date(&self) -> NaiveDate {
        self.night.date
    }
}

impl std::fmt::Debug for TargetScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetScheduler")
            .field("night", &self.night)
            .field("has_matcher", &self.matcher.is_some())
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}
