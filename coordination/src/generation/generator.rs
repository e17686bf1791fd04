//! Artifact generator: prompts plus backend plus response cleaning

use std::sync::Arc;

use super::prompts::{PromptBook, PLANNER_SYSTEM_PROMPT};
use super::response::extract_code;
use super::{GenerationError, GenerationService};
use crate::artifact::{ArtifactKind, ArtifactPair};
use crate::feedback::context::ContextExcerpt;
use crate::feedback::selector::RepairAction;

/// High-level generation operations used by the loop, planner and orchestrator
#[derive(Clone)]
pub struct ArtifactGenerator {
    service: Arc<dyn GenerationService>,
    prompts: PromptBook,
}

impl ArtifactGenerator {
    pub fn new(service: Arc<dyn GenerationService>, prompts: PromptBook) -> Self {
        Self { service, prompts }
    }

    pub fn prompts(&self) -> &PromptBook {
        &self.prompts
    }

    async fn code(&self, user_prompt: &str) -> Result<String, GenerationError> {
        tracing::debug!(prompt_chars = user_prompt.len(), "Requesting generation");
        let raw = self.service.generate(self.prompts.system(), user_prompt).await?;
        let code = extract_code(&raw);
        if code.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(code)
    }

    /// Generate a design; `background` is the text of already-verified modules
    pub async fn design(
        &self,
        requirement: &str,
        background: Option<&str>,
    ) -> Result<String, GenerationError> {
        self.code(&self.prompts.design(requirement, background)).await
    }

    /// Generate a testbench from the design alone
    pub async fn testbench(&self, design: &str) -> Result<String, GenerationError> {
        self.code(&self.prompts.testbench(design)).await
    }

    /// Generate a design and then its testbench
    pub async fn pair(
        &self,
        requirement: &str,
        background: Option<&str>,
    ) -> Result<ArtifactPair, GenerationError> {
        let design = self.design(requirement, background).await?;
        let test = self.testbench(&design).await?;
        Ok(ArtifactPair::new(design, test))
    }

    /// Regenerate the artifact selected by `action`
    pub async fn repair(
        &self,
        action: RepairAction,
        pair: &ArtifactPair,
        diagnostic: &str,
        excerpt: &ContextExcerpt,
    ) -> Result<String, GenerationError> {
        let prompt = match action {
            RepairAction::RepairDesign => self.prompts.repair(
                ArtifactKind::Design,
                &pair.design,
                diagnostic,
                excerpt,
            ),
            RepairAction::RepairTest => {
                self.prompts
                    .repair(ArtifactKind::Test, &pair.test, diagnostic, excerpt)
            }
            RepairAction::GoldenModelTest => {
                self.prompts.golden_model(&pair.design, &pair.test, diagnostic)
            }
        };
        self.code(&prompt).await
    }

    /// Raw plan text (not code-extracted; records are parsed by the planner)
    pub async fn plan_text(&self, requirement: &str) -> Result<String, GenerationError> {
        self.service
            .generate(PLANNER_SYSTEM_PROMPT, &self.prompts.plan(requirement))
            .await
    }
}
