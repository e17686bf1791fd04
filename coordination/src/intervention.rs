//! Working copies and the manual-intervention point
//!
//! Before every verification the loop writes the current pair to fixed paths
//! so an operator can inspect or overwrite them. After a failed attempt the
//! loop consults an [`InterventionGate`]; a [`InterventionDecision::Reload`]
//! makes it re-read both files and verify again without spending an attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::artifact::ArtifactPair;
use crate::verifier::Verdict;

pub const DESIGN_FILE: &str = "design.v";
pub const TEST_FILE: &str = "testbench.v";

#[derive(Debug, Error)]
pub enum WorkingCopyError {
    #[error("Working copy I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The on-disk, operator-editable copy of the current unit's pair
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    dir: PathBuf,
}

impl WorkingCopy {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn design_path(&self) -> PathBuf {
        self.dir.join(DESIGN_FILE)
    }

    pub fn test_path(&self) -> PathBuf {
        self.dir.join(TEST_FILE)
    }

    /// Write both artifacts, creating the directory if needed
    pub async fn persist(&self, pair: &ArtifactPair) -> Result<(), WorkingCopyError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| WorkingCopyError::Io {
                path: self.dir.clone(),
                source,
            })?;
        for (path, text) in [
            (self.design_path(), &pair.design),
            (self.test_path(), &pair.test),
        ] {
            tokio::fs::write(&path, text)
                .await
                .map_err(|source| WorkingCopyError::Io { path, source })?;
        }
        Ok(())
    }

    /// Read both artifacts back from disk
    pub async fn reload(&self) -> Result<ArtifactPair, WorkingCopyError> {
        let design = read(self.design_path()).await?;
        let test = read(self.test_path()).await?;
        Ok(ArtifactPair { design, test })
    }
}

async fn read(path: PathBuf) -> Result<String, WorkingCopyError> {
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| WorkingCopyError::Io { path, source })
}

/// What the operator wants after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionDecision {
    /// Let the loop classify and repair as usual
    Proceed,
    /// Reload the working copies and verify again; no attempt is spent
    Reload,
    /// Stop this unit's loop
    Abort,
}

/// Context handed to the gate at each failure point
#[derive(Debug, Clone, Copy)]
pub struct FailureCheckpoint<'a> {
    pub unit: &'a str,
    pub attempt: u32,
    pub verdict: &'a Verdict,
    /// Where the editable copies live, when the loop has one
    pub working_copy: Option<&'a WorkingCopy>,
}

/// Cooperative pause point consulted after every failed attempt
#[async_trait]
pub trait InterventionGate: Send + Sync {
    async fn on_failure(&self, checkpoint: FailureCheckpoint<'_>) -> InterventionDecision;
}

/// Never intervenes
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoProceed;

#[async_trait]
impl InterventionGate for AutoProceed {
    async fn on_failure(&self, _checkpoint: FailureCheckpoint<'_>) -> InterventionDecision {
        InterventionDecision::Proceed
    }
}

/// Replays a fixed decision sequence, then proceeds
#[derive(Debug, Default)]
pub struct ScriptedGate {
    decisions: Mutex<VecDeque<InterventionDecision>>,
}

impl ScriptedGate {
    pub fn new(decisions: impl IntoIterator<Item = InterventionDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into_iter().collect()),
        }
    }
}

#[async_trait]
impl InterventionGate for ScriptedGate {
    async fn on_failure(&self, _checkpoint: FailureCheckpoint<'_>) -> InterventionDecision {
        self.decisions
            .lock()
            .ok()
            .and_then(|mut d| d.pop_front())
            .unwrap_or(InterventionDecision::Proceed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_persist_then_reload_roundtrips_edits() {
        let dir = tempfile::tempdir().unwrap();
        let copy = WorkingCopy::new(dir.path().join("workspace"));
        copy.persist(&ArtifactPair::new("module a;", "module tb;"))
            .await
            .unwrap();

        std::fs::write(copy.design_path(), "module a_fixed;").unwrap();

        let pair = copy.reload().await.unwrap();
        assert_eq!(pair.design, "module a_fixed;");
        assert_eq!(pair.test, "module tb;");
    }

    #[tokio::test]
    async fn test_reload_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let copy = WorkingCopy::new(dir.path());
        assert!(matches!(
            copy.reload().await,
            Err(WorkingCopyError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_scripted_gate_falls_back_to_proceed() {
        let gate = ScriptedGate::new([InterventionDecision::Reload]);
        let verdict = Verdict::testbench_failure("FAIL");
        let checkpoint = FailureCheckpoint {
            unit: "u",
            attempt: 0,
            verdict: &verdict,
            working_copy: None,
        };
        assert_eq!(gate.on_failure(checkpoint).await, InterventionDecision::Reload);
        assert_eq!(gate.on_failure(checkpoint).await, InterventionDecision::Proceed);
    }
}
