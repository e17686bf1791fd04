//! Prompt templates for design, testbench, repair and planning requests

use crate::artifact::ArtifactKind;
use crate::feedback::context::ContextExcerpt;

/// Base system prompt for every Verilog-producing request
pub const VERILOG_SYSTEM_PROMPT: &str = "You are acting as an expert Computer Hardware Engineer specializing in Verilog (hardware description language). \
Your goal is to write Synthesizable Verilog 2001 code. \
Follow these explicit rules:\n\
1. Use `module` and `endmodule` explicitly.\n\
2. Use `parameter` for configurable widths.\n\
3. Use synchronous active-high reset unless specified otherwise.\n\
4. Always use non-blocking assignments (`<=`) in sequential logic and blocking (`=`) in combinational logic.\n\
5. Do NOT output markdown backticks (```verilog) if possible, or ensure they are easily parseable.\n\
6. Output ONLY the code when requested. All code must be contained within a single code block, not multiple code blocks or files.\n\
7. You are to avoid using System Verilog at all times, including making common mistakes such as declaring variables in initial blocks.";

/// System prompt for the planning request
pub const PLANNER_SYSTEM_PROMPT: &str = "You are a senior hardware architect. \
You decompose hardware requirements into small, independently testable Verilog modules. \
You answer only with plan records, one per line, and nothing else.";

/// Prompt builder holding the (possibly extended) system prompt
#[derive(Debug, Clone)]
pub struct PromptBook {
    system: String,
}

impl Default for PromptBook {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PromptBook {
    /// Create a prompt book, appending operator instructions to the system prompt
    pub fn new(extra_instructions: Option<&str>) -> Self {
        let mut system = VERILOG_SYSTEM_PROMPT.to_string();
        if let Some(extra) = extra_instructions.filter(|s| !s.trim().is_empty()) {
            system.push_str("\n\nADDITIONAL INSTRUCTIONS:\n");
            system.push_str(extra);
        }
        Self { system }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// Request for a design module; `background` holds already-verified modules
    pub fn design(&self, requirement: &str, background: Option<&str>) -> String {
        let mut prompt = format!(
            "Write a Verilog module for the following requirement: {}.\n\
             Ensure the interface signals are clearly defined.\n",
            requirement.trim_end_matches('.')
        );
        if let Some(context) = background.filter(|s| !s.trim().is_empty()) {
            prompt.push_str(
                "\nThe following modules are already implemented and verified. \
                 Instantiate them where useful, but DO NOT repeat their code in your response.\n\n",
            );
            prompt.push_str("--- Available Modules ---\n");
            prompt.push_str(context);
            prompt.push('\n');
        }
        prompt
    }

    /// Request for a self-checking testbench of `design`
    pub fn testbench(&self, design: &str) -> String {
        format!(
            "Write a self-checking Verilog testbench for the following module.\n\
             1. Instantiate the Unit Under Test (UUT).\n\
             2. Generate a clock (if sequential).\n\
             3. Apply test vectors covering corner cases.\n\
             4. Use `$display` and `$error` to report pass/fail.\n\
             5. End simulation with `$finish`.\n\
             6. DO NOT include the design module code in your response. Only the testbench.\n\
             7. The testbench module name must be `tb_<module_name>` or similar.\n\n\
             --- Design Under Test ---\n{}",
            design
        )
    }

    /// Generic repair of one artifact from its full text and the diagnostic
    pub fn repair(
        &self,
        kind: ArtifactKind,
        code: &str,
        diagnostic: &str,
        excerpt: &ContextExcerpt,
    ) -> String {
        let file_type = match kind {
            ArtifactKind::Design => "module",
            ArtifactKind::Test => "testbench",
        };
        let mut prompt = format!(
            "The following Verilog {} failed verification.\n\
             Please fix the code. Return ONLY the full corrected code.\n",
            file_type
        );
        if kind == ArtifactKind::Test {
            prompt.push_str(
                "DO NOT include the design module code. Output ONLY the testbench module.\n",
            );
        }
        prompt.push_str(&format!("--- Error Log ---\n{}\n\n", diagnostic));
        if !excerpt.is_empty() {
            prompt.push_str("--- Offending Lines (marked >>) ---\n");
            prompt.push_str(&excerpt.render());
            prompt.push('\n');
        }
        prompt.push_str(&format!("--- Original Code ---\n{}", code));
        prompt
    }

    /// Rewrite the testbench against the design after repeated logic failures
    pub fn golden_model(&self, design: &str, test: &str, diagnostic: &str) -> String {
        format!(
            "The design below has been repaired several times, but the testbench keeps reporting failures.\n\
             The testbench is now suspected to be wrong: its expected values, timing or check conditions \
             may be stricter than the requirement or sampled at the wrong clock edge.\n\
             Act as a verification engineer:\n\
             1. Derive a reference (golden) model of the intended behavior from the design's interface and comments.\n\
             2. Rewrite the testbench so its expected values come from that model.\n\
             3. Sample outputs only after they are stable (e.g. after the active clock edge settles).\n\
             4. Report every mismatch with `$display` and `$error`, and end with `$finish`.\n\
             5. Output ONLY the corrected testbench module, not the design.\n\n\
             --- Error Log ---\n{}\n\n\
             --- Design Under Test ---\n{}\n\n\
             --- Current Testbench ---\n{}",
            diagnostic, design, test
        )
    }

    /// Request for a line-record decomposition of `requirement`
    pub fn plan(&self, requirement: &str) -> String {
        format!(
            "Decompose the following hardware requirement into Verilog modules.\n\
             List independent leaf modules first, then modules that use them, and finish with \
             exactly one top-level module that wraps everything.\n\
             Emit one record per line in exactly this format:\n\
             MODULE: <name> | TYPE: <submodule|top> | DESC: <one-line description>\n\
             If the requirement is simple, emit a single TYPE: top record.\n\n\
             --- Requirement ---\n{}",
            requirement
        )
    }
}
