//! Verification Feedback Module
//!
//! Turns a failed verification into the next repair:
//! - Classify the diagnostic (compile, runtime, timeout) and pick the artifact at fault
//! - Extract the source lines the diagnostic points at
//! - Choose a repair strategy, escalating to a golden-model testbench rewrite
//!   when the design keeps failing at runtime
//!
//! # Architecture
//!
//! ```text
//! Pair → Verifier → Classifier → Selector → Generator → Pair'
//!          ↑                                              |
//!          └──────────────────────────────────────────────┘
//! ```

pub mod classifier;
pub mod context;
pub mod selector;
pub mod verification_loop;

pub use classifier::{Classification, ClassifierConfig, DiagnosticClassifier, FailureCategory};
pub use context::{extract_context, ContextExcerpt};
pub use selector::{AttemptState, RepairAction, RepairSelector};
pub use verification_loop::{
    AttemptRecord, AttemptResolution, LoopConfig, LoopError, LoopOutcome, LoopState,
    VerificationLoop,
};
