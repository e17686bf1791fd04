//! Verification-repair loop
//!
//! Drives one unit through bounded attempts:
//! 1. Persist the working copy
//! 2. Verify `context ++ design` against the testbench
//! 3. On failure, classify, consult the intervention gate, select a repair
//! 4. Regenerate the targeted artifact and try again
//!
//! The loop is deterministic for a given sequence of verdicts and generated
//! texts; all nondeterminism lives behind the generation service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::artifact::{ArtifactKind, ArtifactPair};
use crate::events::{EventSink, NullSink, ProgressEvent};
use crate::feedback::classifier::{Classification, ClassifierConfig, DiagnosticClassifier};
use crate::feedback::context::{extract_context, lines_mentioning, ContextExcerpt};
use crate::feedback::selector::{
    AttemptState, RepairAction, RepairSelector, DEFAULT_LOGIC_FAILURE_THRESHOLD,
};
use crate::generation::ArtifactGenerator;
use crate::intervention::{
    AutoProceed, FailureCheckpoint, InterventionDecision, InterventionGate, WorkingCopy,
    WorkingCopyError,
};
use crate::verifier::{ArtifactFileNames, Outcome, PairVerifier, Verdict, VerifierError};

/// Configuration for the verification loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Repairs allowed after the first attempt; the loop verifies at most
    /// `retry_budget + 1` times
    pub retry_budget: u32,
    /// Consecutive runtime failures before switching to a testbench rewrite
    pub logic_failure_threshold: u32,
    /// Send an excerpt around the referenced lines along with the full text
    pub focus_context: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            retry_budget: 5,
            logic_failure_threshold: DEFAULT_LOGIC_FAILURE_THRESHOLD,
            focus_context: true,
        }
    }
}

/// Loop states; every run starts at `Attempting`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    #[default]
    Attempting,
    Succeeded,
    ExhaustedRetries,
    Aborted,
}

impl LoopState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Attempting)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attempting => write!(f, "attempting"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::ExhaustedRetries => write!(f, "exhausted_retries"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// What happened after one verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptResolution {
    Passed,
    Repaired { action: RepairAction },
    Reloaded,
    Exhausted,
    Aborted { reason: String },
}

/// Record of a single verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt index at the time of verification (0-based)
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub classification: Option<Classification>,
    pub resolution: AttemptResolution,
}

/// Result of one loop invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopOutcome {
    /// Terminal state
    pub state: LoopState,
    /// Final pair; on success exactly the pair that passed
    pub pair: ArtifactPair,
    pub attempt_index: u32,
    pub consecutive_logic_failures: u32,
    pub last_verdict: Option<Verdict>,
    pub history: Vec<AttemptRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    pub duration_ms: u64,
}

impl LoopOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == LoopState::Succeeded
    }

    /// Number of verifications performed, reloads included
    pub fn verifications(&self) -> usize {
        self.history.len()
    }
}

/// Environment failures no regeneration can fix
#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Verifier(#[from] VerifierError),

    #[error(transparent)]
    WorkingCopy(#[from] WorkingCopyError),
}

/// Join accumulated context and a design into the text the verifier compiles
pub fn compose_design(context: &str, design: &str) -> String {
    if context.trim().is_empty() {
        design.to_string()
    } else {
        format!("{}\n\n{}", context.trim_end(), design)
    }
}

/// The verification loop controller
pub struct VerificationLoop {
    verifier: Arc<dyn PairVerifier>,
    generator: ArtifactGenerator,
    classifier: DiagnosticClassifier,
    selector: RepairSelector,
    config: LoopConfig,
    file_names: ArtifactFileNames,
    working_copy: Option<WorkingCopy>,
    gate: Arc<dyn InterventionGate>,
    sink: Arc<dyn EventSink>,
}

impl VerificationLoop {
    /// Create a loop; the classifier matches the verifier's file names
    pub fn new(
        verifier: Arc<dyn PairVerifier>,
        generator: ArtifactGenerator,
        config: LoopConfig,
    ) -> Self {
        let file_names = verifier.file_names();
        Self {
            classifier: DiagnosticClassifier::new(ClassifierConfig::for_files(&file_names)),
            selector: RepairSelector::new(config.logic_failure_threshold),
            verifier,
            generator,
            config,
            file_names,
            working_copy: None,
            gate: Arc::new(AutoProceed),
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_classifier(mut self, classifier: DiagnosticClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_working_copy(mut self, working_copy: WorkingCopy) -> Self {
        self.working_copy = Some(working_copy);
        self
    }

    pub fn with_gate(mut self, gate: Arc<dyn InterventionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn generator(&self) -> &ArtifactGenerator {
        &self.generator
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.sink
    }

    /// Run the loop for `unit`, verifying each design after `context`
    pub async fn run(
        &self,
        unit: &str,
        context: &str,
        pair: ArtifactPair,
    ) -> Result<LoopOutcome, LoopError> {
        let start = Instant::now();
        let mut state = AttemptState::new(pair);
        let mut history = Vec::new();

        let (terminal, abort_reason) = loop {
            if let Some(copy) = &self.working_copy {
                copy.persist(&state.current_pair).await?;
            }

            let attempt = state.attempt_index;
            self.sink.emit(ProgressEvent::AttemptStarted {
                unit: unit.to_string(),
                attempt,
            });
            tracing::info!(unit, attempt, budget = self.config.retry_budget, "Verifying");

            let design_text = compose_design(context, &state.current_pair.design);
            let verdict = self
                .verifier
                .verify(&design_text, &state.current_pair.test)
                .await?;

            if verdict.is_success() {
                self.sink.emit(ProgressEvent::AttemptSucceeded {
                    unit: unit.to_string(),
                    attempt,
                    output: verdict.diagnostic.clone(),
                });
                history.push(record(attempt, &verdict, None, AttemptResolution::Passed));
                state.last_verdict = Some(verdict);
                break (LoopState::Succeeded, None);
            }

            let classification = self.classifier.classify(&verdict);
            tracing::warn!(
                unit,
                attempt,
                category = %classification.category,
                target = %classification.target,
                "Verification failed"
            );
            self.sink.emit(ProgressEvent::AttemptFailed {
                unit: unit.to_string(),
                attempt,
                category: classification.category,
                target: classification.target,
                diagnostic: verdict.diagnostic.clone(),
            });

            let decision = self
                .gate
                .on_failure(FailureCheckpoint {
                    unit,
                    attempt,
                    verdict: &verdict,
                    working_copy: self.working_copy.as_ref(),
                })
                .await;

            match decision {
                InterventionDecision::Reload => {
                    if let Some(copy) = &self.working_copy {
                        state.current_pair = copy.reload().await?;
                        tracing::info!(unit, attempt, "Reloaded working copy after manual edit");
                        self.sink.emit(ProgressEvent::WorkingCopyReloaded {
                            unit: unit.to_string(),
                            attempt,
                        });
                        history.push(record(
                            attempt,
                            &verdict,
                            Some(classification),
                            AttemptResolution::Reloaded,
                        ));
                        state.last_verdict = Some(verdict);
                        continue;
                    }
                    tracing::warn!(unit, "Reload requested without a working copy; proceeding");
                }
                InterventionDecision::Abort => {
                    let reason = "aborted by operator".to_string();
                    history.push(record(
                        attempt,
                        &verdict,
                        Some(classification),
                        AttemptResolution::Aborted {
                            reason: reason.clone(),
                        },
                    ));
                    state.last_verdict = Some(verdict);
                    break (LoopState::Aborted, Some(reason));
                }
                InterventionDecision::Proceed => {}
            }

            if state.attempt_index >= self.config.retry_budget {
                history.push(record(
                    attempt,
                    &verdict,
                    Some(classification),
                    AttemptResolution::Exhausted,
                ));
                state.last_verdict = Some(verdict);
                state.attempt_index += 1;
                break (LoopState::ExhaustedRetries, None);
            }

            let action = self.selector.select(&mut state, &classification);
            self.sink.emit(ProgressEvent::StrategySelected {
                unit: unit.to_string(),
                attempt,
                action,
            });

            let excerpt = self.focus_excerpt(action, &state.current_pair, context, &verdict);
            match self
                .generator
                .repair(action, &state.current_pair, &verdict.diagnostic, &excerpt)
                .await
            {
                Ok(updated) => {
                    let target = action.target();
                    let previous = state.current_pair.replace(target, updated.clone());
                    tracing::info!(unit, attempt, %action, "Artifact regenerated");
                    self.sink.emit(ProgressEvent::ArtifactRepaired {
                        unit: unit.to_string(),
                        artifact: target,
                        previous,
                        updated,
                    });
                }
                Err(e) => {
                    tracing::warn!(unit, attempt, error = %e, "Generation backend failed during repair");
                    let reason = format!("generation backend failed: {e}");
                    history.push(record(
                        attempt,
                        &verdict,
                        Some(classification),
                        AttemptResolution::Aborted {
                            reason: reason.clone(),
                        },
                    ));
                    state.last_verdict = Some(verdict);
                    break (LoopState::Aborted, Some(reason));
                }
            }

            history.push(record(
                attempt,
                &verdict,
                Some(classification),
                AttemptResolution::Repaired { action },
            ));
            state.last_verdict = Some(verdict);
            state.attempt_index += 1;
        };

        let outcome = LoopOutcome {
            state: terminal,
            attempt_index: state.attempt_index,
            consecutive_logic_failures: state.consecutive_logic_failures,
            pair: state.current_pair,
            last_verdict: state.last_verdict,
            history,
            abort_reason,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        match outcome.state {
            LoopState::Succeeded => {
                tracing::info!(unit, attempts = outcome.attempt_index + 1, "Unit verified")
            }
            other => tracing::warn!(
                unit,
                state = %other,
                attempt_index = outcome.attempt_index,
                "Unit not verified"
            ),
        }
        self.sink.emit(ProgressEvent::UnitFinished {
            unit: unit.to_string(),
            state: outcome.state,
            attempts: outcome.attempt_index,
        });
        Ok(outcome)
    }

    /// Excerpt of the artifact the repair targets, or empty when unavailable
    fn focus_excerpt(
        &self,
        action: RepairAction,
        pair: &ArtifactPair,
        context: &str,
        verdict: &Verdict,
    ) -> ContextExcerpt {
        if !self.config.focus_context {
            return ContextExcerpt::default();
        }
        match action {
            // The design file the toolchain saw includes the context prefix,
            // so its line numbers index the composed text.
            RepairAction::RepairDesign => extract_context(
                &compose_design(context, &pair.design),
                &lines_mentioning(
                    &verdict.diagnostic,
                    &self.file_names.design,
                    &[self.file_names.test.as_str()],
                ),
            ),
            RepairAction::RepairTest => extract_context(
                pair.get(ArtifactKind::Test),
                &lines_mentioning(
                    &verdict.diagnostic,
                    &self.file_names.test,
                    &[self.file_names.design.as_str()],
                ),
            ),
            RepairAction::GoldenModelTest => ContextExcerpt::default(),
        }
    }
}

fn record(
    attempt: u32,
    verdict: &Verdict,
    classification: Option<Classification>,
    resolution: AttemptResolution,
) -> AttemptRecord {
    AttemptRecord {
        attempt,
        timestamp: Utc::now(),
        outcome: verdict.outcome,
        classification,
        resolution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{GenerationError, GenerationService, PromptBook};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedVerifier {
        verdicts: Mutex<VecDeque<Verdict>>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedVerifier {
        fn new(verdicts: Vec<Verdict>) -> Self {
            Self {
                verdicts: Mutex::new(verdicts.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PairVerifier for ScriptedVerifier {
        async fn verify(&self, design: &str, test: &str) -> Result<Verdict, VerifierError> {
            self.seen
                .lock()
                .unwrap()
                .push((design.to_string(), test.to_string()));
            Ok(self
                .verdicts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Verdict::testbench_failure("FAIL: script exhausted")))
        }
    }

    /// Returns `fix<N>` for the N-th request
    #[derive(Default)]
    struct CountingService {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl GenerationService for CountingService {
        async fn generate(&self, _s: &str, _u: &str) -> Result<String, GenerationError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            Ok(format!("fix{}", *calls))
        }
    }

    fn build(
        verdicts: Vec<Verdict>,
        budget: u32,
    ) -> (VerificationLoop, Arc<ScriptedVerifier>, Arc<CountingService>) {
        let verifier = Arc::new(ScriptedVerifier::new(verdicts));
        let service = Arc::new(CountingService::default());
        let generator = ArtifactGenerator::new(service.clone(), PromptBook::default());
        let config = LoopConfig {
            retry_budget: budget,
            ..Default::default()
        };
        (
            VerificationLoop::new(verifier.clone(), generator, config),
            verifier,
            service,
        )
    }

    #[tokio::test]
    async fn test_first_attempt_success_makes_no_generation_calls() {
        let (vloop, _, service) = build(vec![Verdict::success("ok")], 3);
        let pair = ArtifactPair::new("module d;", "module tb;");

        let outcome = vloop.run("u", "", pair.clone()).await.unwrap();

        assert_eq!(outcome.state, LoopState::Succeeded);
        assert_eq!(outcome.pair, pair);
        assert_eq!(outcome.attempt_index, 0);
        assert_eq!(*service.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_context_prefixes_design_only() {
        let (vloop, verifier, _) = build(vec![Verdict::success("ok")], 0);
        vloop
            .run("top", "module leaf; endmodule", ArtifactPair::new("module top;", "module tb;"))
            .await
            .unwrap();

        let seen = verifier.seen.lock().unwrap();
        assert_eq!(seen[0].0, "module leaf; endmodule\n\nmodule top;");
        assert_eq!(seen[0].1, "module tb;");
    }

    #[tokio::test]
    async fn test_compile_error_in_testbench_repairs_testbench() {
        let (vloop, _, _) = build(
            vec![
                Verdict::compile_failure("generated_module_tb.v:2: syntax error"),
                Verdict::success("ok"),
            ],
            3,
        );
        let outcome = vloop
            .run("u", "", ArtifactPair::new("module d;", "module tb;\n  oops"))
            .await
            .unwrap();

        assert!(outcome.succeeded());
        assert_eq!(outcome.pair.design, "module d;");
        assert_eq!(outcome.pair.test, "fix1");
        assert_eq!(
            outcome.history[0].resolution,
            AttemptResolution::Repaired {
                action: RepairAction::RepairTest
            }
        );
    }

    #[tokio::test]
    async fn test_exhaustion_after_budget() {
        let (vloop, verifier, service) = build(vec![], 2);
        let outcome = vloop
            .run("u", "", ArtifactPair::new("d", "t"))
            .await
            .unwrap();

        assert_eq!(outcome.state, LoopState::ExhaustedRetries);
        assert_eq!(outcome.attempt_index, 3);
        assert_eq!(verifier.seen.lock().unwrap().len(), 3);
        assert_eq!(*service.calls.lock().unwrap(), 2);
        assert_eq!(outcome.history.last().unwrap().resolution, AttemptResolution::Exhausted);
    }

    #[test]
    fn test_compose_design() {
        assert_eq!(compose_design("", "m"), "m");
        assert_eq!(compose_design("a\n\n", "m"), "a\n\nm");
    }

    #[test]
    fn test_loop_state_terminality() {
        assert!(!LoopState::Attempting.is_terminal());
        assert!(LoopState::Aborted.is_terminal());
        assert_eq!(LoopState::default(), LoopState::Attempting);
    }
}
