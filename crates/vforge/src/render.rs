//! Console presentation of progress events

use colored::Colorize;
use coordination::{ArtifactKind, BuildStatus, EventSink, LoopState, ProgressEvent};
use std::io::Write;
use std::sync::Mutex;

use crate::diff::unified_diff;

/// Lines of context shown around each diff hunk
const DIFF_CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub show_diffs: bool,
    /// Print full generated artifacts, not just their size
    pub show_artifacts: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_diffs: true,
            show_artifacts: true,
        }
    }
}

/// [`EventSink`] that writes human-readable progress to a terminal
pub struct ConsoleRenderer<W: Write + Send> {
    out: Mutex<W>,
    options: RenderOptions,
}

impl ConsoleRenderer<std::io::Stdout> {
    pub fn stdout(options: RenderOptions) -> Self {
        Self::new(std::io::stdout(), options)
    }
}

impl<W: Write + Send> ConsoleRenderer<W> {
    pub fn new(out: W, options: RenderOptions) -> Self {
        Self {
            out: Mutex::new(out),
            options,
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn format(&self, event: &ProgressEvent) -> Option<String> {
        let text = match event {
            ProgressEvent::PlanReady { units } => {
                let mut text = format!("{} {} unit(s)\n", "Plan:".bold().blue(), units.len());
                for (i, unit) in units.iter().enumerate() {
                    text.push_str(&format!(
                        "  {}. {} [{}] {}\n",
                        i + 1,
                        unit.name.bold(),
                        unit.kind,
                        unit.description.dimmed()
                    ));
                }
                text
            }
            ProgressEvent::PlanFallback { reason } => format!(
                "{} {reason}; building the requirement as one module\n",
                "Plan fallback:".yellow()
            ),
            ProgressEvent::UnitStarted {
                unit,
                kind,
                position,
                total,
            } => format!(
                "\n{} {} ({kind}, {position}/{total})\n",
                "==> Building".bold().blue(),
                unit.bold()
            ),
            ProgressEvent::ArtifactGenerated {
                unit,
                artifact,
                text,
            } => {
                let title = match artifact {
                    ArtifactKind::Design => "Generated design",
                    ArtifactKind::Test => "Generated testbench",
                };
                if self.options.show_artifacts {
                    format!("{} ({unit}):\n{}\n", title.bold(), numbered(text))
                } else {
                    format!("{} ({unit}): {} lines\n", title.bold(), text.lines().count())
                }
            }
            ProgressEvent::AttemptStarted { attempt, .. } => format!(
                "\n{}\n",
                format!("--- Simulation Attempt {} ---", attempt + 1)
                    .bold()
                    .yellow()
            ),
            ProgressEvent::AttemptSucceeded { output, .. } => {
                format!("{}\n{}\n", "Simulation passed".bold().green(), output.trim_end())
            }
            ProgressEvent::AttemptFailed {
                category,
                target,
                diagnostic,
                ..
            } => format!(
                "{} ({category}, blaming the {target})\n{}\n",
                "Simulation failed".bold().red(),
                diagnostic.trim_end()
            ),
            ProgressEvent::StrategySelected { attempt, action, .. } => format!(
                "{} {} (fix {})\n",
                "Strategy:".bold(),
                action,
                attempt + 1
            ),
            ProgressEvent::ArtifactRepaired {
                artifact,
                previous,
                updated,
                ..
            } => {
                if !self.options.show_diffs {
                    return None;
                }
                let diff = unified_diff(previous, updated, DIFF_CONTEXT);
                if diff.is_empty() {
                    format!("{} regenerated {artifact} is unchanged\n", "Note:".yellow())
                } else {
                    format!("{} {artifact}:\n{}", "Changes to".bold(), colorize_diff(&diff))
                }
            }
            ProgressEvent::WorkingCopyReloaded { unit, .. } => format!(
                "{} edited working copy of {unit}\n",
                "Reloaded".bold().cyan()
            ),
            ProgressEvent::UnitFinished {
                unit,
                state,
                attempts,
            } => match state {
                LoopState::Succeeded => format!(
                    "{} {unit} verified after {} attempt(s)\n",
                    "OK".bold().green(),
                    attempts + 1
                ),
                LoopState::ExhaustedRetries => format!(
                    "{} {unit}: max retries reached, validation failed\n",
                    "FAILED".bold().red()
                ),
                LoopState::Aborted => format!("{} {unit}\n", "ABORTED".bold().red()),
                LoopState::Attempting => return None,
            },
            ProgressEvent::BuildFinished { status } => match status {
                BuildStatus::Verified => {
                    format!("\n{}\n", "SUCCESS! Design verified.".bold().green())
                }
                BuildStatus::Degraded => format!(
                    "\n{}\n",
                    "Top module verified, but some submodules failed verification."
                        .bold()
                        .yellow()
                ),
                BuildStatus::Failed => {
                    format!("\n{}\n", "Validation failed.".bold().red())
                }
                BuildStatus::ShortCircuited => format!(
                    "\n{}\n",
                    "Build stopped at a failed submodule.".bold().red()
                ),
                BuildStatus::Aborted => format!(
                    "\n{}\n",
                    "Build aborted; verified modules are kept in the report."
                        .bold()
                        .red()
                ),
            },
        };
        Some(text)
    }
}

impl<W: Write + Send> EventSink for ConsoleRenderer<W> {
    fn emit(&self, event: ProgressEvent) {
        let Some(text) = self.format(&event) else {
            return;
        };
        if let Ok(mut out) = self.out.lock() {
            if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
                tracing::debug!(error = %e, "Console write failed");
            }
        }
    }
}

fn numbered(text: &str) -> String {
    let width = text.lines().count().to_string().len();
    text.lines()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

fn colorize_diff(diff: &str) -> String {
    diff.lines()
        .map(|line| {
            let styled = if line.starts_with("@@") {
                line.cyan().to_string()
            } else if line.starts_with('+') {
                line.green().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else {
                line.to_string()
            };
            styled + "\n"
        })
        .collect()
}
