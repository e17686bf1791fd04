//! Artifact types shared by the verifier, the repair loop and the orchestrator.

use serde::{Deserialize, Serialize};

/// Which half of an artifact pair a diagnostic or repair refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// The synthesizable design module
    Design,
    /// The self-checking testbench
    Test,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Design => write!(f, "design"),
            Self::Test => write!(f, "testbench"),
        }
    }
}

/// A design and the testbench that checks it.
///
/// Each repair attempt replaces one side and produces a new version of the
/// pair; older versions are not retained.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactPair {
    pub design: String,
    pub test: String,
}

impl ArtifactPair {
    pub fn new(design: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            design: design.into(),
            test: test.into(),
        }
    }

    /// Borrow one side of the pair
    pub fn get(&self, kind: ArtifactKind) -> &str {
        match kind {
            ArtifactKind::Design => &self.design,
            ArtifactKind::Test => &self.test,
        }
    }

    /// Replace one side of the pair, returning the text it replaced
    pub fn replace(&mut self, kind: ArtifactKind, text: String) -> String {
        let slot = match kind {
            ArtifactKind::Design => &mut self.design,
            ArtifactKind::Test => &mut self.test,
        };
        std::mem::replace(slot, text)
    }
}
