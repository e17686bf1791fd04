//! End-to-end `vforge design` runs against a mocked generation backend and
//! a scripted verifier; no Ollama server or Icarus install needed.

use async_trait::async_trait;
use mockall::mock;
use std::sync::{Arc, Mutex};

use coordination::{
    AutoProceed, BuildStatus, GenerationError, GenerationService, PairVerifier, RecordingSink,
    Verdict, VerifierError,
};
use vforge::{run_design, AppConfig, Collaborators};

mock! {
    pub Backend {}

    #[async_trait]
    impl GenerationService for Backend {
        async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, GenerationError>;
    }
}

/// Fails the first `failures` verifications, then passes
struct FlakyVerifier {
    failures: Mutex<u32>,
}

#[async_trait]
impl PairVerifier for FlakyVerifier {
    async fn verify(&self, _design: &str, _test: &str) -> Result<Verdict, VerifierError> {
        let mut left = self.failures.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Ok(Verdict::testbench_failure("ERROR: count mismatch at t=40"));
        }
        Ok(Verdict::success("All tests passed"))
    }
}

fn backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_generate().returning(|_, user| {
        if user.starts_with("Write a self-checking") {
            Ok("```verilog\nmodule tb_counter; initial $finish; endmodule\n```".to_string())
        } else {
            Ok("```verilog\nmodule counter(input clk, output reg [3:0] q); endmodule\n```".to_string())
        }
    });
    backend
}

fn config(dir: &std::path::Path) -> AppConfig {
    AppConfig {
        designs_dir: dir.join("designs"),
        workspace_dir: dir.join("build"),
        plan: false,
        max_retries: 2,
        ..Default::default()
    }
}

fn collaborators(
    backend: MockBackend,
    failures: u32,
    sink: Arc<RecordingSink>,
) -> Collaborators {
    Collaborators {
        service: Arc::new(backend),
        verifier: Arc::new(FlakyVerifier {
            failures: Mutex::new(failures),
        }),
        sink,
        gate: Arc::new(AutoProceed),
    }
}

#[tokio::test]
async fn test_verified_design_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let sink = Arc::new(RecordingSink::new());

    let run = run_design(&config, "4-bit counter", collaborators(backend(), 1, sink.clone()))
        .await
        .unwrap();

    assert_eq!(run.report.status, BuildStatus::Verified);
    let saved = run.saved_to.expect("verified design should be saved");
    assert!(saved
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("_4-bit_counter"));
    let design = std::fs::read_to_string(saved.join("design.v")).unwrap();
    assert!(design.contains("module counter"));
    assert!(saved.join("testbench.v").exists());

    // The working copy was kept up to date for manual edits
    assert!(dir.path().join("build/working/design.v").exists());
    assert_eq!(sink.count("artifact_repaired"), 1);
}

#[tokio::test]
async fn test_failed_design_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let run = run_design(
        &config,
        "4-bit counter",
        collaborators(backend(), 10, Arc::new(RecordingSink::new())),
    )
    .await
    .unwrap();

    assert_eq!(run.report.status, BuildStatus::Failed);
    assert!(run.saved_to.is_none());
    assert!(!dir.path().join("designs").exists());
}

#[tokio::test]
async fn test_backend_outage_surfaces_as_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = MockBackend::new();
    backend
        .expect_generate()
        .times(1)
        .returning(|_, _| Err(GenerationError::Unavailable("connection refused".to_string())));

    let err = run_design(
        &config(dir.path()),
        "4-bit counter",
        collaborators(backend, 0, Arc::new(RecordingSink::new())),
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("connection refused"));
}
