//! Verifier Module: compile-then-simulate checks for an artifact pair
//!
//! The verifier is the only source of truth for whether a generated pair is
//! acceptable. It owns no state between calls.
//!
//! # Pipeline
//!
//! ```text
//! write <stem>.v + <stem>_tb.v → iverilog -o <stem>.out → vvp <stem>.out (bounded) → Verdict
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use coordination::verifier::{IcarusToolchain, PairVerifier, Verifier, VerifierConfig};
//!
//! let verifier = Verifier::new(Arc::new(IcarusToolchain::default()), VerifierConfig::default());
//! let verdict = verifier.verify(&design, &testbench).await?;
//! println!("{}", verdict.outcome);
//! ```

pub mod pipeline;
pub mod toolchain;
pub mod verdict;

pub use pipeline::{PairVerifier, Verifier, VerifierConfig};
pub use toolchain::{ArtifactFileNames, IcarusConfig, IcarusToolchain, Toolchain, ToolchainRun};
pub use verdict::{Outcome, Verdict};

use std::path::PathBuf;
use thiserror::Error;

/// Environment failures of the verifier.
///
/// A timed-out simulation is not an error; it is a [`Verdict`] with
/// [`Outcome::Timeout`].
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
