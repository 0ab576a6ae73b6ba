//! Execution plans for dispatched targets.
//!
//! A plan is a flat, ordered list of steps built fresh from a selection and
//! a template. The executor owns it; nothing in the plan points back into
//! the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::selector::Selection;
use crate::api::TargetId;
use crate::models::{Coordinates, ReferenceCandidate, Target};

/// How a target's plan is laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTemplate {
    pub name: String,
    /// Wait for the image time before slewing
    pub wait_for_image_time: bool,
    /// Rotate the camera when the target asks for it
    pub rotate: bool,
    /// Reference exposures per target cycle (0 skips the reference)
    pub reference_exposure_count: Option<u32>,
}

impl PlanTemplate {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wait_for_image_time: true,
            rotate: true,
            reference_exposure_count: None,
        }
    }
}

/// One instruction for the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    WaitUntil {
        time: DateTime<Utc>,
    },
    Slew {
        name: String,
        coordinates: Coordinates,
    },
    Rotate {
        angle_deg: f64,
    },
    Expose {
        name: String,
        filter: String,
        exposure_time_secs: f64,
        count: u32,
        /// Counts toward the target's completion
        register: bool,
    },
}

/// Plan for one dispatched target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub target_id: TargetId,
    pub template: String,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub fn has_reference(&self) -> bool {
        self.steps
            .iter()
            .filter(|s| matches!(s, PlanStep::Slew { .. }))
            .count()
            > 1
    }
}

/// Builds execution plans from selections.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    target_template: PlanTemplate,
    reference_template: PlanTemplate,
}

impl PlanBuilder {
    pub fn new(target_template: PlanTemplate, reference_template: PlanTemplate) -> Self {
        Self {
            target_template,
            reference_template,
        }
    }

    /// Target steps, followed by the reference steps when one is attached.
    pub fn build(&self, selection: &Selection) -> ExecutionPlan {
        let target = &selection.target;
        let template = &self.target_template;
        let mut steps = Vec::new();

        if template.wait_for_image_time {
            steps.push(PlanStep::WaitUntil {
                time: selection.image_time,
            });
        }
        steps.push(PlanStep::Slew {
            name: target.name.clone(),
            coordinates: target.coordinates,
        });
        if template.rotate && target.rotation_deg != 0.0 {
            steps.push(PlanStep::Rotate {
                angle_deg: target.rotation_deg,
            });
        }
        steps.push(PlanStep::Expose {
            name: target.name.clone(),
            filter: target.filter.clone(),
            exposure_time_secs: target.exposure_time_secs,
            count: target.exposure_count,
            register: target.register,
        });

        if let Some(reference) = target.reference.as_ref().filter(|_| target.get_reference) {
            self.reference_steps(target, reference, &mut steps);
        }

        ExecutionPlan {
            target_id: target.id,
            template: if target.template.is_empty() {
                template.name.clone()
            } else {
                target.template.clone()
            },
            steps,
        }
    }

    fn reference_steps(&self, target: &Target, reference: &ReferenceCandidate, steps: &mut Vec<PlanStep>) {
        let count = self
            .reference_template
            .reference_exposure_count
            .unwrap_or(target.exposure_count);
        if count == 0 {
            return;
        }
        steps.push(PlanStep::Slew {
            name: reference.name.clone(),
            coordinates: reference.coordinates,
        });
        steps.push(PlanStep::Expose {
            name: reference.name.clone(),
            filter: target.filter.clone(),
            exposure_time_secs: target.exposure_time_secs,
            count,
            register: false,
        });
    }
}
