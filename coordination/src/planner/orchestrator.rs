//! Dependency-ordered build orchestrator
//!
//! Builds every submodule of a plan in order, appending each finished design
//! to a [`BuildContext`], then builds the top unit against the full context.
//! The composite artifact is `context ++ top design` with the top testbench.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use super::{BuildPlanner, Plan, UnitSpec};
use crate::artifact::{ArtifactKind, ArtifactPair};
use crate::events::{EventSink, NullSink, ProgressEvent};
use crate::feedback::verification_loop::{
    compose_design, LoopConfig, LoopError, LoopOutcome, LoopState, VerificationLoop,
};
use crate::generation::{ArtifactGenerator, GenerationError};
use crate::intervention::{InterventionGate, WorkingCopy};
use crate::verifier::PairVerifier;

/// What to do when a submodule exhausts its retry budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedDependencyPolicy {
    /// Append the failing text to the context and keep building
    #[default]
    ContinueDegraded,
    /// Stop the build at the first failed submodule
    ShortCircuit,
}

impl std::fmt::Display for FailedDependencyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContinueDegraded => write!(f, "continue_degraded"),
            Self::ShortCircuit => write!(f, "short_circuit"),
        }
    }
}

impl std::str::FromStr for FailedDependencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "continue_degraded" | "continue" => Ok(Self::ContinueDegraded),
            "short_circuit" | "stop" => Ok(Self::ShortCircuit),
            other => Err(format!(
                "unknown failed-dependency policy '{other}' (expected continue_degraded or short_circuit)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub loop_config: LoopConfig,
    pub failed_dependency_policy: FailedDependencyPolicy,
    /// Ask the planner for a decomposition; otherwise build one top unit
    pub plan: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            loop_config: LoopConfig::default(),
            failed_dependency_policy: FailedDependencyPolicy::default(),
            plan: true,
        }
    }
}

/// A unit recorded in the build context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub name: String,
    pub verified: bool,
}

/// Append-only accumulation of finished submodule designs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    text: String,
    entries: Vec<ContextEntry>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit's design under a labeled separator
    pub fn append(&mut self, name: &str, design: &str, verified: bool) {
        let status = if verified { "verified" } else { "UNVERIFIED" };
        self.text
            .push_str(&format!("// ==== Module: {name} ({status}) ====\n"));
        self.text.push_str(design.trim_end());
        self.text.push_str("\n\n");
        self.entries.push(ContextEntry {
            name: name.to_string(),
            verified,
        });
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Context as generation background, `None` while empty
    pub fn background(&self) -> Option<&str> {
        (!self.is_empty()).then_some(self.text.as_str())
    }
}

/// Overall build result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Every unit verified
    Verified,
    /// The top unit verified but at least one submodule did not
    Degraded,
    /// The top unit exhausted its retry budget
    Failed,
    /// A submodule failed under [`FailedDependencyPolicy::ShortCircuit`]
    ShortCircuited,
    /// A unit's loop was aborted by the operator or a backend failure;
    /// units finished before it are kept in the report
    Aborted,
}

impl BuildStatus {
    pub fn is_verified(self) -> bool {
        self == Self::Verified
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Degraded => write!(f, "degraded"),
            Self::Failed => write!(f, "failed"),
            Self::ShortCircuited => write!(f, "short_circuited"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitReport {
    pub spec: UnitSpec,
    pub outcome: LoopOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub requirement: String,
    pub plan: Plan,
    pub units: Vec<UnitReport>,
    pub status: BuildStatus,
    /// Submodule designs accumulated before the build ended
    pub context: BuildContext,
    /// `context ++ top design` with the top testbench; absent when the top
    /// unit never finished
    pub composite: Option<ArtifactPair>,
    pub duration_ms: u64,
}

impl BuildReport {
    pub fn failed_units(&self) -> Vec<&str> {
        self.units
            .iter()
            .filter(|u| !u.outcome.succeeded())
            .map(|u| u.spec.name.as_str())
            .collect()
    }

    /// Unit whose loop was aborted and the recorded reason
    pub fn aborted(&self) -> Option<(&str, &str)> {
        self.units
            .iter()
            .find(|u| u.outcome.state == LoopState::Aborted)
            .map(|u| {
                (
                    u.spec.name.as_str(),
                    u.outcome.abort_reason.as_deref().unwrap_or("aborted"),
                )
            })
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Planning failed: {0}")]
    Planning(#[source] GenerationError),

    #[error("Initial generation for unit '{unit}' failed: {source}")]
    Generation {
        unit: String,
        #[source]
        source: GenerationError,
    },

    #[error("Verification environment failed for unit '{unit}': {source}")]
    Loop {
        unit: String,
        #[source]
        source: LoopError,
    },
}

/// Runs a plan unit by unit through the verification loop
pub struct BuildOrchestrator {
    generator: ArtifactGenerator,
    verification: VerificationLoop,
    config: OrchestratorConfig,
    sink: Arc<dyn EventSink>,
}

impl BuildOrchestrator {
    pub fn new(
        verifier: Arc<dyn PairVerifier>,
        generator: ArtifactGenerator,
        config: OrchestratorConfig,
    ) -> Self {
        let verification =
            VerificationLoop::new(verifier, generator.clone(), config.loop_config.clone());
        Self {
            generator,
            verification,
            config,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.verification = self.verification.with_sink(sink.clone());
        self.sink = sink;
        self
    }

    pub fn with_working_copy(mut self, working_copy: WorkingCopy) -> Self {
        self.verification = self.verification.with_working_copy(working_copy);
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn InterventionGate>) -> Self {
        self.verification = self.verification.with_gate(gate);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Plan and build `requirement`
    pub async fn build(&self, requirement: &str) -> Result<BuildReport, BuildError> {
        let plan = if self.config.plan {
            BuildPlanner::new(self.generator.clone())
                .with_sink(self.sink.clone())
                .plan(requirement)
                .await
                .map_err(BuildError::Planning)?
        } else {
            let plan = Plan::single(requirement);
            self.sink.emit(ProgressEvent::PlanReady {
                units: plan.units.clone(),
            });
            plan
        };
        self.build_plan(requirement, plan).await
    }

    /// Build an already-parsed plan
    pub async fn build_plan(
        &self,
        requirement: &str,
        plan: Plan,
    ) -> Result<BuildReport, BuildError> {
        let start = Instant::now();
        let total = plan.len();
        let mut context = BuildContext::new();
        let mut units = Vec::with_capacity(total);
        let submodules: Vec<UnitSpec> = plan.submodules().cloned().collect();

        for (position, spec) in submodules.iter().enumerate() {
            let outcome = self
                .build_unit(spec, &spec.description, position + 1, total, &context)
                .await?;
            if outcome.state == LoopState::Aborted {
                units.push(UnitReport {
                    spec: spec.clone(),
                    outcome,
                });
                tracing::warn!(unit = %spec.name, "Submodule aborted; stopping build");
                return Ok(self.finish(
                    requirement,
                    plan,
                    units,
                    context,
                    BuildStatus::Aborted,
                    None,
                    start,
                ));
            }
            let verified = outcome.succeeded();
            context.append(&spec.name, &outcome.pair.design, verified);
            units.push(UnitReport {
                spec: spec.clone(),
                outcome,
            });

            if !verified {
                match self.config.failed_dependency_policy {
                    FailedDependencyPolicy::ContinueDegraded => {
                        tracing::warn!(
                            unit = %spec.name,
                            "Submodule failed verification; continuing with unverified text"
                        );
                    }
                    FailedDependencyPolicy::ShortCircuit => {
                        tracing::warn!(unit = %spec.name, "Submodule failed verification; stopping build");
                        return Ok(self.finish(
                            requirement,
                            plan,
                            units,
                            context,
                            BuildStatus::ShortCircuited,
                            None,
                            start,
                        ));
                    }
                }
            }
        }

        let Some(top) = plan.top().cloned() else {
            // parse_plan and Plan::single always end with a top unit
            tracing::warn!("Plan has no top unit; nothing to assemble");
            return Ok(self.finish(
                requirement,
                plan,
                units,
                context,
                BuildStatus::Failed,
                None,
                start,
            ));
        };

        let top_requirement = if plan.fallback || top.description == requirement {
            requirement.to_string()
        } else {
            format!(
                "{requirement}\n\nTop-level module `{}`: {}",
                top.name, top.description
            )
        };
        let outcome = self
            .build_unit(&top, &top_requirement, total, total, &context)
            .await?;
        if outcome.state == LoopState::Aborted {
            units.push(UnitReport { spec: top, outcome });
            return Ok(self.finish(
                requirement,
                plan,
                units,
                context,
                BuildStatus::Aborted,
                None,
                start,
            ));
        }

        let submodules_ok = units.iter().all(|u| u.outcome.succeeded());
        let status = match (outcome.succeeded(), submodules_ok) {
            (true, true) => BuildStatus::Verified,
            (true, false) => BuildStatus::Degraded,
            (false, _) => BuildStatus::Failed,
        };
        let composite = ArtifactPair::new(
            compose_design(context.as_str(), &outcome.pair.design),
            outcome.pair.test.clone(),
        );
        units.push(UnitReport { spec: top, outcome });

        Ok(self.finish(
            requirement,
            plan,
            units,
            context,
            status,
            Some(composite),
            start,
        ))
    }

    /// Generate a unit's initial pair and drive it through the loop
    async fn build_unit(
        &self,
        spec: &UnitSpec,
        requirement: &str,
        position: usize,
        total: usize,
        context: &BuildContext,
    ) -> Result<LoopOutcome, BuildError> {
        tracing::info!(unit = %spec.name, kind = %spec.kind, position, total, "Building unit");
        self.sink.emit(ProgressEvent::UnitStarted {
            unit: spec.name.clone(),
            kind: spec.kind,
            position,
            total,
        });

        let pair = self
            .generator
            .pair(requirement, context.background())
            .await
            .map_err(|source| BuildError::Generation {
                unit: spec.name.clone(),
                source,
            })?;
        self.emit_generated(spec, ArtifactKind::Design, &pair.design);
        self.emit_generated(spec, ArtifactKind::Test, &pair.test);

        self.verification
            .run(&spec.name, context.as_str(), pair)
            .await
            .map_err(|source| BuildError::Loop {
                unit: spec.name.clone(),
                source,
            })
    }

    fn emit_generated(&self, spec: &UnitSpec, artifact: ArtifactKind, text: &str) {
        self.sink.emit(ProgressEvent::ArtifactGenerated {
            unit: spec.name.clone(),
            artifact,
            text: text.to_string(),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        requirement: &str,
        plan: Plan,
        units: Vec<UnitReport>,
        context: BuildContext,
        status: BuildStatus,
        composite: Option<ArtifactPair>,
        start: Instant,
    ) -> BuildReport {
        let report = BuildReport {
            requirement: requirement.to_string(),
            plan,
            units,
            status,
            context,
            composite,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            %status,
            units = report.units.len(),
            failed = report.failed_units().len(),
            duration_ms = report.duration_ms,
            "Build finished"
        );
        self.sink.emit(ProgressEvent::BuildFinished { status });
        report
    }
}
