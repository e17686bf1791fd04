//! Build orchestrator integration tests: plan parsing, dependency order,
//! failed-dependency policies and abort propagation, all against scripted
//! generation and verification fakes.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use coordination::{
    parse_plan, ArtifactGenerator, BuildError, BuildOrchestrator, BuildStatus,
    FailedDependencyPolicy, GenerationError, GenerationService, LoopConfig, LoopState,
    OrchestratorConfig, PairVerifier, ProgressEvent, PromptBook, RecordingSink, UnitKind, UnitSpec,
    Verdict, VerifierError,
};

const ALU_PLAN: &str = "MODULE: alu | TYPE: submodule | DESC: 8-bit adder\n\
                        MODULE: top | TYPE: top | DESC: wraps alu";

// ── Fakes ──────────────────────────────────────────────────────────

/// Answers each prompt kind with canned Verilog
struct HdlService {
    plan: Option<String>,
    fail_repairs: bool,
    prompts: Mutex<Vec<String>>,
}

impl HdlService {
    fn new(plan: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            plan: plan.map(str::to_string),
            fail_repairs: false,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing_repairs(plan: &str) -> Arc<Self> {
        Arc::new(Self {
            plan: Some(plan.to_string()),
            fail_repairs: true,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

fn fenced(code: &str) -> String {
    format!("```verilog\n{code}\n```")
}

#[async_trait]
impl GenerationService for HdlService {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(user.to_string());

        if user.contains("Decompose") {
            return self
                .plan
                .clone()
                .ok_or_else(|| GenerationError::Unavailable("planner down".to_string()));
        }
        if user.contains("failed verification") || user.contains("--- Current Testbench ---") {
            if self.fail_repairs {
                return Err(GenerationError::Unavailable("connection refused".to_string()));
            }
            let code = if user.contains("tb_alu") || user.contains("module alu") {
                "module tb_alu_retry; endmodule"
            } else {
                "module tb_top_retry; endmodule"
            };
            return Ok(fenced(code));
        }
        if user.starts_with("Write a self-checking") {
            let code = if user.contains("module alu") {
                "module tb_alu; endmodule"
            } else {
                "module tb_top; endmodule"
            };
            return Ok(fenced(code));
        }
        let code = if user.contains("8-bit adder") {
            "module alu(input [7:0] a, b, output [7:0] y); assign y = a + b; endmodule"
        } else {
            "module top; alu u0(); endmodule"
        };
        Ok(fenced(code))
    }
}

/// Fails any pair whose testbench mentions `failing`
struct MarkerVerifier {
    failing: Option<&'static str>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MarkerVerifier {
    fn new(failing: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            failing,
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PairVerifier for MarkerVerifier {
    async fn verify(&self, design: &str, test: &str) -> Result<Verdict, VerifierError> {
        self.calls
            .lock()
            .unwrap()
            .push((design.to_string(), test.to_string()));
        match self.failing {
            Some(marker) if test.contains(marker) => {
                Ok(Verdict::testbench_failure("ERROR: y mismatch"))
            }
            _ => Ok(Verdict::success("PASS")),
        }
    }
}

fn orchestrator(
    service: Arc<HdlService>,
    verifier: Arc<MarkerVerifier>,
    policy: FailedDependencyPolicy,
) -> BuildOrchestrator {
    let config = OrchestratorConfig {
        loop_config: LoopConfig {
            retry_budget: 1,
            ..Default::default()
        },
        failed_dependency_policy: policy,
        plan: true,
    };
    BuildOrchestrator::new(
        verifier,
        ArtifactGenerator::new(service, PromptBook::default()),
        config,
    )
}

// ── Plan parsing ───────────────────────────────────────────────────

#[test]
fn test_alu_plan_parses_in_order() {
    let plan = parse_plan(ALU_PLAN, "cpu");
    assert_eq!(
        plan.units,
        vec![
            UnitSpec::new("alu", UnitKind::Submodule, "8-bit adder"),
            UnitSpec::new("top", UnitKind::Top, "wraps alu"),
        ]
    );
}

#[test]
fn test_unparseable_plan_falls_back_to_design_unit() {
    let plan = parse_plan("I think you should build a counter.", "a 4-bit counter");
    assert_eq!(
        plan.units,
        vec![UnitSpec::new("design", UnitKind::Top, "a 4-bit counter")]
    );
}

// ── Dependency order ───────────────────────────────────────────────

#[tokio::test]
async fn test_builds_submodule_then_top_against_context() {
    let service = HdlService::new(Some(ALU_PLAN));
    let verifier = MarkerVerifier::new(None);
    let sink = Arc::new(RecordingSink::new());
    let report = orchestrator(
        service.clone(),
        verifier.clone(),
        FailedDependencyPolicy::default(),
    )
    .with_sink(sink.clone())
    .build("cpu")
    .await
    .unwrap();

    assert_eq!(report.status, BuildStatus::Verified);
    assert_eq!(report.units.len(), 2);
    assert_eq!(report.units[0].spec.name, "alu");
    assert_eq!(report.units[1].spec.name, "top");

    let composite = report.composite.unwrap();
    assert!(composite
        .design
        .starts_with("// ==== Module: alu (verified) ====\nmodule alu("));
    assert!(composite.design.ends_with("module top; alu u0(); endmodule"));
    assert_eq!(composite.test, "module tb_top; endmodule");

    // The top unit is verified with the alu prepended
    let calls = verifier.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].0.contains("module alu("));

    // Top design sees the context; its testbench sees only the top design
    let prompts = service.prompts();
    let top_design_prompt = prompts
        .iter()
        .find(|p| p.contains("Top-level module `top`"))
        .unwrap();
    assert!(top_design_prompt.contains("--- Available Modules ---"));
    assert!(top_design_prompt.starts_with("Write a Verilog module for the following requirement: cpu"));
    let top_tb_prompt = prompts
        .iter()
        .filter(|p| p.starts_with("Write a self-checking"))
        .nth(1)
        .unwrap();
    assert!(!top_tb_prompt.contains("module alu("));

    let events = sink.events();
    assert_eq!(events.first().map(|e| e.event_type()), Some("plan_ready"));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::BuildFinished {
            status: BuildStatus::Verified
        })
    );
    assert_eq!(sink.count("unit_started"), 2);
}

#[tokio::test]
async fn test_failed_submodule_degrades_but_continues() {
    let service = HdlService::new(Some(ALU_PLAN));
    let verifier = MarkerVerifier::new(Some("tb_alu"));
    let report = orchestrator(service, verifier, FailedDependencyPolicy::ContinueDegraded)
        .build("cpu")
        .await
        .unwrap();

    assert_eq!(report.status, BuildStatus::Degraded);
    assert_eq!(report.failed_units(), vec!["alu"]);
    assert_eq!(report.units[0].outcome.state, LoopState::ExhaustedRetries);
    assert_eq!(report.units[0].outcome.attempt_index, 2);

    let composite = report.composite.unwrap();
    assert!(composite
        .design
        .starts_with("// ==== Module: alu (UNVERIFIED) ===="));
}

#[tokio::test]
async fn test_failed_submodule_short_circuits() {
    let service = HdlService::new(Some(ALU_PLAN));
    let verifier = MarkerVerifier::new(Some("tb_alu"));
    let report = orchestrator(
        service.clone(),
        verifier,
        FailedDependencyPolicy::ShortCircuit,
    )
    .build("cpu")
    .await
    .unwrap();

    assert_eq!(report.status, BuildStatus::ShortCircuited);
    assert_eq!(report.units.len(), 1);
    assert!(report.composite.is_none());
    assert!(!service
        .prompts()
        .iter()
        .any(|p| p.contains("Top-level module `top`")));
}

// ── Fallback and single-shot ───────────────────────────────────────

#[tokio::test]
async fn test_plan_fallback_builds_requirement_verbatim() {
    let service = HdlService::new(Some("Here is a plan: just build it."));
    let sink = Arc::new(RecordingSink::new());
    let report = orchestrator(
        service.clone(),
        MarkerVerifier::new(None),
        FailedDependencyPolicy::default(),
    )
    .with_sink(sink.clone())
    .build("a 4-bit counter")
    .await
    .unwrap();

    assert!(report.plan.fallback);
    assert_eq!(report.units.len(), 1);
    assert_eq!(report.units[0].spec.name, "design");
    assert_eq!(sink.count("plan_fallback"), 1);
    assert!(service.prompts()[1]
        .starts_with("Write a Verilog module for the following requirement: a 4-bit counter."));
    assert_eq!(report.status, BuildStatus::Verified);
}

#[tokio::test]
async fn test_no_plan_skips_planner() {
    let service = HdlService::new(None);
    let config = OrchestratorConfig {
        plan: false,
        ..Default::default()
    };
    let report = BuildOrchestrator::new(
        MarkerVerifier::new(None),
        ArtifactGenerator::new(service.clone(), PromptBook::default()),
        config,
    )
    .build("a 4-bit counter")
    .await
    .unwrap();

    assert_eq!(report.status, BuildStatus::Verified);
    assert!(!service.prompts().iter().any(|p| p.contains("Decompose")));
}

// ── Errors ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_planner_backend_failure_is_an_error() {
    let err = orchestrator(
        HdlService::new(None),
        MarkerVerifier::new(None),
        FailedDependencyPolicy::default(),
    )
    .build("cpu")
    .await
    .unwrap_err();

    assert!(matches!(err, BuildError::Planning(GenerationError::Unavailable(_))));
}

#[tokio::test]
async fn test_backend_failure_during_repair_aborts_build() {
    let report = orchestrator(
        HdlService::failing_repairs(ALU_PLAN),
        MarkerVerifier::new(Some("tb_alu")),
        FailedDependencyPolicy::default(),
    )
    .build("cpu")
    .await
    .unwrap();

    assert_eq!(report.status, BuildStatus::Aborted);
    assert_eq!(report.units.len(), 1);
    assert!(report.composite.is_none());
    let (unit, reason) = report.aborted().unwrap();
    assert_eq!(unit, "alu");
    assert!(reason.contains("connection refused"));
}

#[tokio::test]
async fn test_top_abort_keeps_verified_submodules() {
    let sink = Arc::new(RecordingSink::new());
    let report = orchestrator(
        HdlService::failing_repairs(ALU_PLAN),
        MarkerVerifier::new(Some("tb_top")),
        FailedDependencyPolicy::default(),
    )
    .with_sink(sink.clone())
    .build("cpu")
    .await
    .unwrap();

    assert_eq!(report.status, BuildStatus::Aborted);
    assert_eq!(report.aborted().map(|(unit, _)| unit), Some("top"));

    // The alu verified before the top unit aborted and is still reported
    assert_eq!(report.units.len(), 2);
    assert_eq!(report.units[0].spec.name, "alu");
    assert_eq!(report.units[0].outcome.state, LoopState::Succeeded);
    assert!(report.units[0].outcome.pair.design.starts_with("module alu("));
    assert!(report
        .context
        .as_str()
        .starts_with("// ==== Module: alu (verified) ====\nmodule alu("));
    assert_eq!(report.failed_units(), vec!["top"]);
    assert_eq!(
        sink.events().last(),
        Some(&ProgressEvent::BuildFinished {
            status: BuildStatus::Aborted
        })
    );
}
