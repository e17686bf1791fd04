//! Verilog synthesis coordination library
//!
//! This library provides:
//! - A verification-repair loop that drives a generated design/testbench pair
//!   through compile-then-simulate checks and regenerates whichever side is at fault
//! - A build planner that decomposes a requirement into submodules plus one top unit
//! - A dependency-ordered orchestrator that builds each unit against the
//!   designs of the units before it
//!
//! # Modules
//!
//! - [`verifier`]: `verify(design, test) -> Verdict` over an Icarus Verilog toolchain
//! - [`feedback`]: diagnostic classifier, context excerpts, repair selector, the loop
//! - [`generation`]: generation-service contract, prompts, the Ollama backend
//! - [`planner`]: plan parsing and the build orchestrator
//! - [`events`]: progress events and sinks
//! - [`intervention`]: working copies and the operator pause point
//!
//! # Usage
//!
//! ```rust,ignore
//! use coordination::{
//!     ArtifactGenerator, BuildOrchestrator, IcarusToolchain, OllamaClient, OllamaConfig,
//!     OrchestratorConfig, PromptBook, Verifier, VerifierConfig,
//! };
//!
//! let service = Arc::new(OllamaClient::new(OllamaConfig::default())?);
//! let generator = ArtifactGenerator::new(service, PromptBook::default());
//! let verifier = Arc::new(Verifier::new(
//!     Arc::new(IcarusToolchain::default()),
//!     VerifierConfig::default(),
//! ));
//! let report = BuildOrchestrator::new(verifier, generator, OrchestratorConfig::default())
//!     .build("8-bit ALU with add, sub, and, or")
//!     .await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod artifact;
pub mod events;
pub mod feedback;
pub mod generation;
pub mod intervention;
pub mod planner;
pub mod verifier;

pub use artifact::{ArtifactKind, ArtifactPair};

// Re-export event types
pub use events::{EventSink, NullSink, ProgressEvent, RecordingSink};

// Re-export loop types
pub use feedback::{
    AttemptRecord, AttemptResolution, Classification, ClassifierConfig, ContextExcerpt,
    DiagnosticClassifier, FailureCategory, LoopConfig, LoopError, LoopOutcome, LoopState,
    RepairAction, RepairSelector, VerificationLoop,
};

// Re-export generation types
pub use generation::{
    ArtifactGenerator, GenerationError, GenerationService, OllamaClient, OllamaConfig, PromptBook,
};

// Re-export intervention types
pub use intervention::{
    AutoProceed, FailureCheckpoint, InterventionDecision, InterventionGate, ScriptedGate,
    WorkingCopy, WorkingCopyError,
};

// Re-export planner types
pub use planner::{
    parse_plan, BuildContext, BuildError, BuildOrchestrator, BuildPlanner, BuildReport,
    BuildStatus, FailedDependencyPolicy, OrchestratorConfig, Plan, UnitKind, UnitReport, UnitSpec,
};

// Re-export verifier types
pub use verifier::{
    ArtifactFileNames, IcarusConfig, IcarusToolchain, Outcome, PairVerifier, Toolchain,
    ToolchainRun, Verdict, Verifier, VerifierConfig, VerifierError,
};
