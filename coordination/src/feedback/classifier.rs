//! Diagnostic classification
//!
//! Decides which failure category a verdict belongs to and which artifact
//! the next repair should target. Pure string heuristics, kept in one place
//! so they can be tuned without touching the loop.

use crate::artifact::ArtifactKind;
use crate::verifier::{ArtifactFileNames, Outcome, Verdict};
use serde::{Deserialize, Serialize};

/// Failure categories that drive repair selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Syntax or elaboration rejected by the compiler
    CompileFailure,
    /// The simulation ran but a check failed or the process crashed
    RuntimeFailure,
    /// The simulation exceeded its wall-clock budget
    Timeout,
}

impl FailureCategory {
    /// Whether this category counts toward the logic-failure streak
    pub fn is_logic_failure(&self) -> bool {
        matches!(self, Self::RuntimeFailure)
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompileFailure => write!(f, "compile_failure"),
            Self::RuntimeFailure => write!(f, "runtime_failure"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Result of classifying one failed verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: FailureCategory,
    /// Artifact the diagnostic implicates
    pub target: ArtifactKind,
}

/// Tokens the classifier looks for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Any of these marks a timeout (checked first)
    pub timeout_tokens: Vec<String>,
    /// Any of these marks a compile/syntax failure
    pub compile_markers: Vec<String>,
    /// Generated testbench file name; its presence in a compile diagnostic
    /// means the testbench, not the design, is broken
    pub test_file_name: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::for_files(&ArtifactFileNames::default())
    }
}

impl ClassifierConfig {
    /// Default tokens, matching against the given toolchain file names
    pub fn for_files(names: &ArtifactFileNames) -> Self {
        Self {
            timeout_tokens: vec!["TIMEOUT ERROR".to_string()],
            compile_markers: vec![
                "COMPILATION ERROR".to_string(),
                "syntax error".to_string(),
                "I give up.".to_string(),
            ],
            test_file_name: names.test.clone(),
        }
    }
}

/// Pure classifier over verdict diagnostics
#[derive(Debug, Clone, Default)]
pub struct DiagnosticClassifier {
    config: ClassifierConfig,
}

impl DiagnosticClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a failed verdict.
    ///
    /// Text rules decide first: timeout token, then compile marker, then
    /// runtime failure. When no token is present but the verdict's own
    /// outcome is a timeout or compile failure, the outcome is trusted.
    pub fn classify(&self, verdict: &Verdict) -> Classification {
        if let Some(category) = self.category_from_text(&verdict.diagnostic) {
            return self.with_target(category, &verdict.diagnostic);
        }
        let category = match verdict.outcome {
            Outcome::Timeout => FailureCategory::Timeout,
            Outcome::CompileFailure => FailureCategory::CompileFailure,
            Outcome::RuntimeFailure | Outcome::Success => FailureCategory::RuntimeFailure,
        };
        self.with_target(category, &verdict.diagnostic)
    }

    /// Classify raw diagnostic text using the text rules alone
    pub fn classify_text(&self, diagnostic: &str) -> Classification {
        let category = self
            .category_from_text(diagnostic)
            .unwrap_or(FailureCategory::RuntimeFailure);
        self.with_target(category, diagnostic)
    }

    fn category_from_text(&self, diagnostic: &str) -> Option<FailureCategory> {
        if contains_any(diagnostic, &self.config.timeout_tokens) {
            Some(FailureCategory::Timeout)
        } else if contains_any(diagnostic, &self.config.compile_markers) {
            Some(FailureCategory::CompileFailure)
        } else {
            None
        }
    }

    fn with_target(&self, category: FailureCategory, diagnostic: &str) -> Classification {
        let target = match category {
            FailureCategory::CompileFailure => {
                let name = self.config.test_file_name.as_str();
                if !name.is_empty() && diagnostic.contains(name) {
                    ArtifactKind::Test
                } else {
                    ArtifactKind::Design
                }
            }
            // A run that never terminates is missing `$finish` or a bounded
            // stimulus loop, both of which live in the testbench.
            FailureCategory::Timeout => ArtifactKind::Test,
            FailureCategory::RuntimeFailure => ArtifactKind::Design,
        };
        Classification { category, target }
    }
}

fn contains_any(text: &str, tokens: &[String]) -> bool {
    tokens
        .iter()
        .any(|t| !t.is_empty() && text.contains(t.as_str()))
}
