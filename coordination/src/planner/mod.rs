//! Build Planner Module
//!
//! Decomposes a requirement into an ordered list of units: zero or more
//! submodules followed by exactly one top unit. The generation service is
//! asked for line records of the form
//!
//! ```text
//! MODULE: <name> | TYPE: <submodule|top> | DESC: <text>
//! ```
//!
//! Parsing is best-effort. Lines that do not match are skipped, and a reply
//! with no usable record degrades to a single top unit carrying the whole
//! requirement.

pub mod orchestrator;

pub use orchestrator::{
    BuildContext, BuildError, BuildOrchestrator, BuildReport, BuildStatus, FailedDependencyPolicy,
    OrchestratorConfig, UnitReport,
};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

use crate::events::{EventSink, NullSink, ProgressEvent};
use crate::generation::{ArtifactGenerator, GenerationError};

static PLAN_RECORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"MODULE:\s*(.+?)\s*\|\s*TYPE:\s*(\w+)\s*\|\s*DESC:\s*(.+)").unwrap()
});

/// Name of the unit built when no plan record parses
pub const FALLBACK_UNIT_NAME: &str = "design";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Submodule,
    Top,
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submodule => write!(f, "submodule"),
            Self::Top => write!(f, "top"),
        }
    }
}

impl std::str::FromStr for UnitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "submodule" | "sub" => Ok(Self::Submodule),
            "top" => Ok(Self::Top),
            other => Err(format!("unknown unit kind: {other}")),
        }
    }
}

/// One buildable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub kind: UnitKind,
    pub description: String,
}

impl UnitSpec {
    pub fn new(name: impl Into<String>, kind: UnitKind, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
        }
    }
}

/// An ordered build plan; always ends with exactly one top unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub units: Vec<UnitSpec>,
    /// Set when no record parsed and the requirement became the only unit
    pub fallback: bool,
}

impl Plan {
    /// Single top unit wrapping the whole requirement
    pub fn single(requirement: &str) -> Self {
        Self {
            units: vec![UnitSpec::new(
                FALLBACK_UNIT_NAME,
                UnitKind::Top,
                requirement,
            )],
            fallback: true,
        }
    }

    pub fn submodules(&self) -> impl Iterator<Item = &UnitSpec> {
        self.units.iter().filter(|u| u.kind == UnitKind::Submodule)
    }

    pub fn top(&self) -> Option<&UnitSpec> {
        self.units.last().filter(|u| u.kind == UnitKind::Top)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Extract every well-formed record from `text`, in order.
///
/// Records with an unknown TYPE or an empty name are dropped.
pub fn parse_records(text: &str) -> Vec<UnitSpec> {
    text.lines()
        .filter_map(|line| {
            let caps = PLAN_RECORD.captures(line)?;
            let name = caps[1].trim_matches(|c: char| c == '`' || c == '*' || c.is_whitespace());
            if name.is_empty() {
                return None;
            }
            let kind = caps[2].parse::<UnitKind>().ok()?;
            Some(UnitSpec::new(name, kind, caps[3].trim()))
        })
        .collect()
}

/// Turn a planner reply into a [`Plan`].
///
/// The last `top` record wins; earlier ones are built as submodules. With no
/// `top` record the last submodule is promoted.
pub fn parse_plan(text: &str, requirement: &str) -> Plan {
    let mut records = parse_records(text);
    let Some(top_index) = records
        .iter()
        .rposition(|u| u.kind == UnitKind::Top)
        .or_else(|| records.len().checked_sub(1))
    else {
        return Plan::single(requirement);
    };

    let mut top = records.remove(top_index);
    top.kind = UnitKind::Top;
    for unit in &mut records {
        unit.kind = UnitKind::Submodule;
    }
    records.push(top);
    Plan {
        units: records,
        fallback: false,
    }
}

/// Requests and parses a decomposition from the generation service
pub struct BuildPlanner {
    generator: ArtifactGenerator,
    sink: Arc<dyn EventSink>,
}

impl BuildPlanner {
    pub fn new(generator: ArtifactGenerator) -> Self {
        Self {
            generator,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Plan `requirement`; only a backend failure is an error
    pub async fn plan(&self, requirement: &str) -> Result<Plan, GenerationError> {
        let reply = self.generator.plan_text(requirement).await?;
        let plan = parse_plan(&reply, requirement);

        if plan.fallback {
            tracing::warn!(
                reply_chars = reply.len(),
                "No plan records parsed; building requirement as a single unit"
            );
            self.sink.emit(ProgressEvent::PlanFallback {
                reason: "no parseable MODULE records in planner reply".to_string(),
            });
        } else {
            tracing::info!(
                units = plan.len(),
                top = plan.top().map(|u| u.name.as_str()).unwrap_or_default(),
                "Plan ready"
            );
        }
        self.sink.emit(ProgressEvent::PlanReady {
            units: plan.units.clone(),
        });
        Ok(plan)
    }
}
