//! Selector state carried between "next target" calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::api::{TargetId, TimeWindow};
use crate::config::DomeSettings;
use crate::models::Target;

/// Where the selection loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerPhase {
    /// No target in flight
    Idle,
    Selecting,
    /// A target was handed to the executor
    Dispatched,
    Completing,
    /// The last call found nothing; a later call may
    Exhausted,
}

/// Dome geometry for the night.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomeState {
    pub azimuth: f64,
    pub slit_width: f64,
    pub locked: bool,
}

impl From<&DomeSettings> for DomeState {
    fn from(settings: &DomeSettings) -> Self {
        Self {
            azimuth: settings.azimuth,
            slit_width: settings.slit_width,
            locked: settings.locked,
        }
    }
}

/// Which selection rule produced a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionTier {
    /// Upcoming dome-slit window
    Primary,
    /// Image time already open or just passed
    Secondary,
    /// Filler candidate, not counted
    Filler,
}

impl std::fmt::Display for SelectionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
            Self::Filler => write!(f, "filler"),
        }
    }
}

/// The target currently handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub id: TargetId,
    pub tier: SelectionTier,
    pub image_time: DateTime<Utc>,
    pub snapped: bool,
}

/// Mutable selector state.
#[derive(Debug, Clone)]
pub struct SchedulerState {
    /// Dispatched target, looked up by id in the target list
    pub current: Option<Dispatch>,
    /// Last completed target
    pub previous: Option<TargetId>,
    pub night: TimeWindow,
    pub dome: DomeState,
    /// Filler candidates, consumed front to back
    pub fillers: VecDeque<Target>,
    /// Dispatched filler; fillers are not part of the target list
    pub filler_in_flight: Option<Target>,
    pub phase: SchedulerPhase,
}

impl SchedulerState {
    pub fn new(night: TimeWindow, dome: DomeState) -> Self {
        Self {
            current: None,
            previous: None,
            night,
            dome,
            fillers: VecDeque::new(),
            filler_in_flight: None,
            phase: SchedulerPhase::Idle,
        }
    }

    pub fn with_fillers(mut self, fillers: impl IntoIterator<Item = Target>) -> Self {
        self.fillers = fillers.into_iter().collect();
        self
    }

    pub fn is_dispatched(&self) -> bool {
        self.phase == SchedulerPhase::Dispatched && self.current.is_some()
    }

    /// Drop the dispatched target without counting it.
    pub fn clear_current(&mut self) {
        self.current = None;
        self.filler_in_flight = None;
        self.phase = SchedulerPhase::Idle;
    }
}
