//! Progress events emitted by the verification loop and the build orchestrator

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactKind;
use crate::feedback::classifier::FailureCategory;
use crate::feedback::selector::RepairAction;
use crate::feedback::verification_loop::LoopState;
use crate::planner::orchestrator::BuildStatus;
use crate::planner::{UnitKind, UnitSpec};

/// Everything a presentation layer needs to follow a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// The planner produced its unit list
    PlanReady { units: Vec<UnitSpec> },

    /// No plan record parsed; the requirement is built as one top unit
    PlanFallback { reason: String },

    /// A unit's build is starting (`position` is 1-based)
    UnitStarted {
        unit: String,
        kind: UnitKind,
        position: usize,
        total: usize,
    },

    /// Initial text for one side of a unit's pair
    ArtifactGenerated {
        unit: String,
        artifact: ArtifactKind,
        text: String,
    },

    /// Verification attempt `attempt` (0-based) is starting
    AttemptStarted { unit: String, attempt: u32 },

    AttemptSucceeded {
        unit: String,
        attempt: u32,
        output: String,
    },

    AttemptFailed {
        unit: String,
        attempt: u32,
        category: FailureCategory,
        target: ArtifactKind,
        diagnostic: String,
    },

    StrategySelected {
        unit: String,
        attempt: u32,
        action: RepairAction,
    },

    /// One side of the pair was regenerated; `previous` is kept for diffing
    ArtifactRepaired {
        unit: String,
        artifact: ArtifactKind,
        previous: String,
        updated: String,
    },

    /// The operator edited the working copies and the loop picked them up
    WorkingCopyReloaded { unit: String, attempt: u32 },

    UnitFinished {
        unit: String,
        state: LoopState,
        attempts: u32,
    },

    BuildFinished { status: BuildStatus },
}

impl ProgressEvent {
    /// Short event name for logs
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PlanReady { .. } => "plan_ready",
            Self::PlanFallback { .. } => "plan_fallback",
            Self::UnitStarted { .. } => "unit_started",
            Self::ArtifactGenerated { .. } => "artifact_generated",
            Self::AttemptStarted { .. } => "attempt_started",
            Self::AttemptSucceeded { .. } => "attempt_succeeded",
            Self::AttemptFailed { .. } => "attempt_failed",
            Self::StrategySelected { .. } => "strategy_selected",
            Self::ArtifactRepaired { .. } => "artifact_repaired",
            Self::WorkingCopyReloaded { .. } => "working_copy_reloaded",
            Self::UnitFinished { .. } => "unit_finished",
            Self::BuildFinished { .. } => "build_finished",
        }
    }

    /// Unit the event belongs to, if any
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::UnitStarted { unit, .. }
            | Self::ArtifactGenerated { unit, .. }
            | Self::AttemptStarted { unit, .. }
            | Self::AttemptSucceeded { unit, .. }
            | Self::AttemptFailed { unit, .. }
            | Self::StrategySelected { unit, .. }
            | Self::ArtifactRepaired { unit, .. }
            | Self::WorkingCopyReloaded { unit, .. }
            | Self::UnitFinished { unit, .. } => Some(unit),
            Self::PlanReady { .. } | Self::PlanFallback { .. } | Self::BuildFinished { .. } => None,
        }
    }
}
