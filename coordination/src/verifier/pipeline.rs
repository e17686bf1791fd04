//! Verifier: thin adapter from a toolchain run to a [`Verdict`]
//!
//! Hands the wall-clock budget to the toolchain's execute stage and
//! translates an overrun into `Verdict { outcome: Timeout }` instead of
//! propagating a raw failure. A slow compile is never reported as a timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::toolchain::{ArtifactFileNames, Toolchain, ToolchainRun};
use super::verdict::Verdict;
use super::VerifierError;

/// Anything that can turn a (design, testbench) pair into a verdict.
///
/// The verification loop depends on this seam so tests can inject scripted
/// verdict sequences.
#[async_trait]
pub trait PairVerifier: Send + Sync {
    async fn verify(&self, design: &str, test: &str) -> Result<Verdict, VerifierError>;

    /// File names the diagnostics refer to
    fn file_names(&self) -> ArtifactFileNames {
        ArtifactFileNames::default()
    }
}

/// Configuration for the verifier adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Wall-clock budget for the execute stage of one run (seconds)
    pub timeout_secs: u64,
    /// Tokens in the simulation output that mark a failed check
    pub failure_tokens: Vec<String>,
    /// Truncate captured output to this many bytes
    pub output_max_bytes: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            failure_tokens: vec!["ERROR".to_string(), "FAIL".to_string()],
            output_max_bytes: 8192,
        }
    }
}

/// The verifier adapter over an external [`Toolchain`]
pub struct Verifier {
    toolchain: Arc<dyn Toolchain>,
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(toolchain: Arc<dyn Toolchain>, config: VerifierConfig) -> Self {
        Self { toolchain, config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Map a completed toolchain run onto a verdict
    pub fn translate(&self, run: ToolchainRun) -> Verdict {
        match run {
            ToolchainRun::CompileFailed { output, .. } => {
                Verdict::compile_failure(self.truncate(&output))
            }
            ToolchainRun::TimedOut { budget } => {
                tracing::warn!(timeout_secs = budget.as_secs(), "Simulation timed out");
                Verdict::timeout(budget.as_secs())
            }
            ToolchainRun::Executed {
                exit_code,
                stdout,
                stderr,
            } => {
                if exit_code != Some(0) {
                    return Verdict::runtime_failure(self.truncate(&stderr), self.truncate(&stdout));
                }
                let reported_failure = self
                    .config
                    .failure_tokens
                    .iter()
                    .any(|token| stdout.contains(token.as_str()) || stderr.contains(token.as_str()));
                if reported_failure {
                    let mut text = stdout;
                    if !stderr.trim().is_empty() {
                        text.push('\n');
                        text.push_str(&stderr);
                    }
                    Verdict::testbench_failure(self.truncate(&text))
                } else {
                    Verdict::success(self.truncate(&stdout))
                }
            }
        }
    }

    /// Truncate captured output to `output_max_bytes` on a char boundary
    fn truncate(&self, text: &str) -> String {
        let max = self.config.output_max_bytes;
        if text.len() <= max {
            return text.to_string();
        }
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}\n... [truncated {} bytes]",
            &text[..end],
            text.len() - end
        )
    }
}

#[async_trait]
impl PairVerifier for Verifier {
    async fn verify(&self, design: &str, test: &str) -> Result<Verdict, VerifierError> {
        let start = Instant::now();
        let budget = Duration::from_secs(self.config.timeout_secs);

        let run = self.toolchain.run(design, test, budget).await?;
        let verdict = self.translate(run);

        tracing::info!(
            outcome = %verdict.outcome,
            duration_ms = start.elapsed().as_millis() as u64,
            "Verification finished"
        );
        Ok(verdict)
    }

    fn file_names(&self) -> ArtifactFileNames {
        self.toolchain.file_names()
    }
}
