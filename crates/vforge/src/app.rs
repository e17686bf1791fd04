//! Wiring from configuration to a running build

use anyhow::{Context, Result};
use coordination::{
    ArtifactGenerator, AutoProceed, BuildOrchestrator, BuildReport, EventSink, GenerationService,
    IcarusToolchain, InterventionGate, OllamaClient, PairVerifier, PromptBook, Verifier,
    WorkingCopy,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::persist::save_design;

/// Result of `vforge design`
#[derive(Debug)]
pub struct DesignRun {
    pub report: BuildReport,
    /// Where the verified design was saved, if it was
    pub saved_to: Option<PathBuf>,
}

/// The external collaborators a build needs
pub struct Collaborators {
    pub service: Arc<dyn GenerationService>,
    pub verifier: Arc<dyn PairVerifier>,
    pub sink: Arc<dyn EventSink>,
    pub gate: Arc<dyn InterventionGate>,
}

impl Collaborators {
    /// Ollama backend and Icarus Verilog toolchain from `config`
    pub fn from_config(config: &AppConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let client = OllamaClient::new(config.ollama()).context("Failed to create Ollama client")?;
        let verifier = Verifier::new(
            Arc::new(IcarusToolchain::new(config.icarus())),
            config.verifier(),
        );
        Ok(Self {
            service: Arc::new(client),
            verifier: Arc::new(verifier),
            sink,
            gate: Arc::new(AutoProceed),
        })
    }

    pub fn with_gate(mut self, gate: Arc<dyn InterventionGate>) -> Self {
        self.gate = gate;
        self
    }
}

pub fn orchestrator(config: &AppConfig, collaborators: Collaborators) -> BuildOrchestrator {
    let prompts = PromptBook::new(config.extra_instructions.as_deref());
    let generator = ArtifactGenerator::new(collaborators.service, prompts);
    BuildOrchestrator::new(collaborators.verifier, generator, config.orchestrator())
        .with_sink(collaborators.sink)
        .with_gate(collaborators.gate)
        .with_working_copy(WorkingCopy::new(config.working_copy_dir()))
}

/// Build `requirement` and save the composite when it verifies
pub async fn run_design(
    config: &AppConfig,
    requirement: &str,
    collaborators: Collaborators,
) -> Result<DesignRun> {
    tracing::info!(
        model = %config.model,
        max_retries = config.max_retries,
        plan = config.plan,
        policy = %config.failed_dependency_policy,
        "Starting design build"
    );
    let report = orchestrator(config, collaborators)
        .build(requirement)
        .await
        .context("Design build failed")?;

    let saved_to = match (&report.composite, report.status.is_verified()) {
        (Some(pair), true) if config.save_on_success => Some(save_design(
            &config.designs_dir,
            requirement,
            pair,
            chrono::Local::now(),
        )?),
        _ => None,
    };
    Ok(DesignRun { report, saved_to })
}

/// Model identifiers the Ollama server offers
pub async fn list_models(config: &AppConfig) -> Result<Vec<String>> {
    let client = OllamaClient::new(config.ollama()).context("Failed to create Ollama client")?;
    let models = client
        .list_models()
        .await
        .with_context(|| format!("Ollama is not reachable at {}", config.ollama_url))?;
    Ok(models.iter().map(|m| m.id().to_string()).collect())
}
