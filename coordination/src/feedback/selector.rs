//! Repair strategy selection
//!
//! Small state machine over [`AttemptState`]: compile failures and timeouts
//! repair whichever artifact the classifier implicated; runtime failures
//! repair the design until the logic-failure streak reaches the threshold,
//! after which the testbench is regenerated against the design instead.

use crate::artifact::{ArtifactKind, ArtifactPair};
use crate::feedback::classifier::{Classification, FailureCategory};
use crate::verifier::Verdict;
use serde::{Deserialize, Serialize};

/// Default number of consecutive runtime failures before the strategy pivots
pub const DEFAULT_LOGIC_FAILURE_THRESHOLD: u32 = 2;

/// What to regenerate next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    /// Generic repair of the design
    RepairDesign,
    /// Generic repair of the testbench
    RepairTest,
    /// Rewrite the testbench against the design's intended behavior
    GoldenModelTest,
}

impl RepairAction {
    /// Artifact this action replaces
    pub fn target(&self) -> ArtifactKind {
        match self {
            Self::RepairDesign => ArtifactKind::Design,
            Self::RepairTest | Self::GoldenModelTest => ArtifactKind::Test,
        }
    }

    fn repair(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Design => Self::RepairDesign,
            ArtifactKind::Test => Self::RepairTest,
        }
    }
}

impl std::fmt::Display for RepairAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RepairDesign => write!(f, "repair_design"),
            Self::RepairTest => write!(f, "repair_test"),
            Self::GoldenModelTest => write!(f, "golden_model_test"),
        }
    }
}

/// Per-loop attempt bookkeeping, discarded when the loop terminates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptState {
    /// Index of the attempt being (or about to be) verified
    pub attempt_index: u32,
    /// Runtime failures in a row since the last compile failure or timeout
    pub consecutive_logic_failures: u32,
    pub current_pair: ArtifactPair,
    pub last_verdict: Option<Verdict>,
}

impl AttemptState {
    pub fn new(pair: ArtifactPair) -> Self {
        Self {
            attempt_index: 0,
            consecutive_logic_failures: 0,
            current_pair: pair,
            last_verdict: None,
        }
    }
}

/// Picks the repair action for each failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSelector {
    logic_failure_threshold: u32,
}

impl Default for RepairSelector {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIC_FAILURE_THRESHOLD)
    }
}

impl RepairSelector {
    pub fn new(logic_failure_threshold: u32) -> Self {
        Self {
            logic_failure_threshold,
        }
    }

    pub fn logic_failure_threshold(&self) -> u32 {
        self.logic_failure_threshold
    }

    /// Select the next action and update the logic-failure streak
    pub fn select(&self, state: &mut AttemptState, classification: &Classification) -> RepairAction {
        match classification.category {
            FailureCategory::CompileFailure | FailureCategory::Timeout => {
                state.consecutive_logic_failures = 0;
                RepairAction::repair(classification.target)
            }
            FailureCategory::RuntimeFailure => {
                if state.consecutive_logic_failures < self.logic_failure_threshold {
                    state.consecutive_logic_failures += 1;
                    RepairAction::RepairDesign
                } else {
                    tracing::info!(
                        streak = state.consecutive_logic_failures,
                        "Persistent logic failures, switching to testbench rewrite"
                    );
                    RepairAction::GoldenModelTest
                }
            }
        }
    }
}
