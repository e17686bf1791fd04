//! Generation Module: the contract with the text-generation backend
//!
//! The backend turns a (system prompt, user prompt) request into text.
//! Failures are typed [`GenerationError`]s, never error strings disguised as
//! generated content, so the verification loop can tell "backend down" apart
//! from "backend produced bad code".

pub mod generator;
pub mod ollama;
pub mod prompts;
pub mod response;

pub use generator::ArtifactGenerator;
pub use ollama::{OllamaClient, OllamaConfig};
pub use prompts::PromptBook;
pub use response::extract_code;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the generation backend
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation request failed: {0}")]
    Request(String),

    #[error("Generation backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Generation response parse error: {0}")]
    Parse(String),

    #[error("Generation backend returned an empty response")]
    EmptyResponse,

    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),
}

/// External text-generation collaborator
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, GenerationError>;
}
