//! Verdict: the structured result of one verification attempt
//!
//! Produced once per attempt by the [`Verifier`](super::Verifier) and consumed
//! by the diagnostic classifier and the repair selector.

use serde::{Deserialize, Serialize};

/// Prefix for diagnostics of a rejected compile stage
pub const COMPILE_PREFIX: &str = "COMPILATION ERROR:";
/// Prefix for diagnostics of a simulation that exceeded its wall-clock budget
pub const TIMEOUT_PREFIX: &str = "TIMEOUT ERROR:";
/// Prefix for diagnostics of a simulator that exited non-zero
pub const RUNTIME_PREFIX: &str = "RUNTIME ERROR:";
/// Prefix for diagnostics of a testbench that reported a failing check
pub const TESTBENCH_PREFIX: &str = "TESTBENCH FAILURE:";
/// Prefix for the captured output of a passing run
pub const SUCCESS_PREFIX: &str = "SIMULATION SUCCESS:";

/// Outcome of a single compile-then-execute run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Compiled, ran, and no check failed
    Success,
    /// Syntax or elaboration rejected by the compiler
    CompileFailure,
    /// Ran but failed an embedded check or exited non-zero
    RuntimeFailure,
    /// Exceeded the wall-clock budget
    Timeout,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::CompileFailure => write!(f, "compile_failure"),
            Self::RuntimeFailure => write!(f, "runtime_failure"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Verdict for one (design, testbench) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    /// Captured toolchain text; never empty for a failing outcome
    pub diagnostic: String,
}

impl Verdict {
    pub fn new(outcome: Outcome, diagnostic: impl Into<String>) -> Self {
        Self {
            outcome,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn success(output: impl AsRef<str>) -> Self {
        Self::new(
            Outcome::Success,
            format!("{}\n{}", SUCCESS_PREFIX, output.as_ref()),
        )
    }

    pub fn compile_failure(log: impl AsRef<str>) -> Self {
        Self::new(
            Outcome::CompileFailure,
            format!("{}\n{}", COMPILE_PREFIX, log.as_ref()),
        )
    }

    pub fn runtime_failure(stderr: impl AsRef<str>, stdout: impl AsRef<str>) -> Self {
        Self::new(
            Outcome::RuntimeFailure,
            format!(
                "{}\n{}\nSTDOUT:\n{}",
                RUNTIME_PREFIX,
                stderr.as_ref(),
                stdout.as_ref()
            ),
        )
    }

    pub fn testbench_failure(stdout: impl AsRef<str>) -> Self {
        Self::new(
            Outcome::RuntimeFailure,
            format!("{}\n{}", TESTBENCH_PREFIX, stdout.as_ref()),
        )
    }

    pub fn timeout(secs: u64) -> Self {
        Self::new(
            Outcome::Timeout,
            format!(
                "{} Simulation exceeded {} seconds. Likely infinite loop (missing $finish) or clock logic error.",
                TIMEOUT_PREFIX, secs
            ),
        )
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_prefix_diagnostics() {
        assert!(Verdict::compile_failure("x.v:3: syntax error")
            .diagnostic
            .starts_with(COMPILE_PREFIX));
        assert!(Verdict::timeout(10).diagnostic.contains("10 seconds"));
        assert_eq!(Verdict::timeout(10).outcome, Outcome::Timeout);

        let runtime = Verdict::runtime_failure("segfault", "t=0");
        assert_eq!(runtime.outcome, Outcome::RuntimeFailure);
        assert!(runtime.diagnostic.contains("STDOUT:\nt=0"));
    }

    #[test]
    fn test_success_flag() {
        assert!(Verdict::success("PASS").is_success());
        assert!(!Verdict::testbench_failure("FAIL").is_success());
    }
}
