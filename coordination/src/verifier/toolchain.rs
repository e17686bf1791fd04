//! Icarus Verilog toolchain: two-stage compile-then-simulate pipeline
//!
//! Writes the pair to fixed paths under the build directory, compiles with
//! `iverilog` and runs the result with `vvp`. Commands run through
//! `tokio::process::Command` with `kill_on_drop`, so dropping the future
//! (which is how the [`Verifier`](super::Verifier) enforces its timeout)
//! terminates the simulation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::VerifierError;

/// File names the toolchain writes, as they appear in its diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFileNames {
    pub design: String,
    pub test: String,
}

impl ArtifactFileNames {
    pub fn for_stem(stem: &str) -> Self {
        Self {
            design: format!("{stem}.v"),
            test: format!("{stem}_tb.v"),
        }
    }
}

impl Default for ArtifactFileNames {
    fn default() -> Self {
        Self::for_stem(DEFAULT_STEM)
    }
}

const DEFAULT_STEM: &str = "generated_module";

/// Raw result of one toolchain invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainRun {
    /// The compile stage exited non-zero; the execute stage never ran
    CompileFailed {
        exit_code: Option<i32>,
        output: String,
    },
    /// The compiled simulation ran to completion
    Executed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The execute stage overran its budget and was killed
    TimedOut { budget: Duration },
}

/// External build-and-execute collaborator
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Compile and execute a (design, testbench) pair.
    ///
    /// `execute_budget` bounds the execute stage only; writing and compiling
    /// run to completion.
    async fn run(
        &self,
        design: &str,
        test: &str,
        execute_budget: Duration,
    ) -> Result<ToolchainRun, VerifierError>;

    /// Names of the files the pair is written to
    fn file_names(&self) -> ArtifactFileNames;
}

/// Configuration for the Icarus Verilog toolchain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcarusConfig {
    /// Compiler binary
    pub compiler: String,
    /// Simulator binary
    pub simulator: String,
    /// Directory the pair and the compiled image are written to
    pub build_dir: PathBuf,
    /// Stem for `<stem>.v`, `<stem>_tb.v` and `<stem>.out`
    pub module_stem: String,
}

impl Default for IcarusConfig {
    fn default() -> Self {
        Self {
            compiler: "iverilog".to_string(),
            simulator: "vvp".to_string(),
            build_dir: PathBuf::from("build"),
            module_stem: DEFAULT_STEM.to_string(),
        }
    }
}

/// `iverilog` + `vvp`
pub struct IcarusToolchain {
    config: IcarusConfig,
}

impl IcarusToolchain {
    pub fn new(config: IcarusConfig) -> Self {
        Self { config }
    }

    pub fn build_dir(&self) -> &Path {
        &self.config.build_dir
    }

    fn image_name(&self) -> String {
        format!("{}.out", self.config.module_stem)
    }

    async fn write(&self, name: &str, contents: &str) -> Result<(), VerifierError> {
        let path = self.config.build_dir.join(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| VerifierError::Io { path, source })
    }

    async fn output(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<std::process::Output, VerifierError> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args)
            .current_dir(&self.config.build_dir)
            .kill_on_drop(true);

        // Own process group so a killed simulation takes its children with it.
        #[cfg(unix)]
        cmd.process_group(0);

        cmd.output().await.map_err(|source| VerifierError::Spawn {
            program: program.to_string(),
            source,
        })
    }
}

impl Default for IcarusToolchain {
    fn default() -> Self {
        Self::new(IcarusConfig::default())
    }
}

#[async_trait]
impl Toolchain for IcarusToolchain {
    async fn run(
        &self,
        design: &str,
        test: &str,
        execute_budget: Duration,
    ) -> Result<ToolchainRun, VerifierError> {
        tokio::fs::create_dir_all(&self.config.build_dir)
            .await
            .map_err(|source| VerifierError::Io {
                path: self.config.build_dir.clone(),
                source,
            })?;

        let names = self.file_names();
        self.write(&names.design, design).await?;
        self.write(&names.test, test).await?;

        let image = self.image_name();
        let compiled = self
            .output(
                &self.config.compiler,
                &["-o", &image, &names.design, &names.test],
            )
            .await?;

        if !compiled.status.success() {
            let mut output = String::from_utf8_lossy(&compiled.stderr).to_string();
            let stdout = String::from_utf8_lossy(&compiled.stdout);
            if !stdout.trim().is_empty() {
                output.push('\n');
                output.push_str(&stdout);
            }
            tracing::debug!(exit_code = ?compiled.status.code(), "Compile stage failed");
            return Ok(ToolchainRun::CompileFailed {
                exit_code: compiled.status.code(),
                output,
            });
        }

        // Dropping the output future on expiry kills the simulator.
        let simulated = match tokio::time::timeout(
            execute_budget,
            self.output(&self.config.simulator, &[&image]),
        )
        .await
        {
            Ok(output) => output?,
            Err(_) => {
                tracing::debug!(budget_ms = execute_budget.as_millis() as u64, "Simulation overran");
                return Ok(ToolchainRun::TimedOut {
                    budget: execute_budget,
                });
            }
        };
        tracing::debug!(exit_code = ?simulated.status.code(), "Simulation finished");

        Ok(ToolchainRun::Executed {
            exit_code: simulated.status.code(),
            stdout: String::from_utf8_lossy(&simulated.stdout).to_string(),
            stderr: String::from_utf8_lossy(&simulated.stderr).to_string(),
        })
    }

    fn file_names(&self) -> ArtifactFileNames {
        ArtifactFileNames::for_stem(&self.config.module_stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_follow_stem() {
        let names = ArtifactFileNames::for_stem("alu");
        assert_eq!(names.design, "alu.v");
        assert_eq!(names.test, "alu_tb.v");
        assert_eq!(ArtifactFileNames::default().test, "generated_module_tb.v");
    }

    #[tokio::test]
    async fn test_missing_compiler_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let toolchain = IcarusToolchain::new(IcarusConfig {
            compiler: "definitely-not-a-verilog-compiler".to_string(),
            build_dir: dir.path().join("build"),
            ..Default::default()
        });

        let err = toolchain
            .run(
                "module m; endmodule",
                "module tb; endmodule",
                Duration::from_secs(10),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, VerifierError::Spawn { .. }));
        // Working files are written before the compiler is launched.
        let written = std::fs::read_to_string(dir.path().join("build/generated_module.v")).unwrap();
        assert_eq!(written, "module m; endmodule");
    }
}
