//! Context window extraction around diagnostic line references
//!
//! Narrows a repair request to the lines a diagnostic points at, with one
//! line of surrounding context on each side.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// `file.v:12:` style positional reference
static LINE_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":(\d+):").unwrap());

/// Lines of context kept before and after each referenced line
const CONTEXT_RADIUS: usize = 1;

/// A single excerpt line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcerptLine {
    /// 0-based index into the source
    pub index: usize,
    pub text: String,
    /// Whether a diagnostic referenced this line directly
    pub offending: bool,
}

/// Annotated excerpt of a source artifact.
///
/// Empty when the diagnostic carried no usable line reference; callers then
/// fall back to sending the whole artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextExcerpt {
    pub lines: Vec<ExcerptLine>,
}

impl ContextExcerpt {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 0-based indices of the offending lines
    pub fn offending(&self) -> Vec<usize> {
        self.lines
            .iter()
            .filter(|l| l.offending)
            .map(|l| l.index)
            .collect()
    }

    /// Render with 1-based line numbers, offending lines marked `>>`
    pub fn render(&self) -> String {
        let width = self
            .lines
            .last()
            .map(|l| (l.index + 1).to_string().len())
            .unwrap_or(1);
        let mut out = String::new();
        let mut previous: Option<usize> = None;
        for line in &self.lines {
            if let Some(prev) = previous {
                if line.index > prev + 1 {
                    out.push_str("   ...\n");
                }
            }
            let marker = if line.offending { ">>" } else { "  " };
            out.push_str(&format!(
                "{} {:>width$} | {}\n",
                marker,
                line.index + 1,
                line.text,
                width = width
            ));
            previous = Some(line.index);
        }
        out
    }
}

/// Distinct 0-based line indices referenced by `:<digits>:` patterns
pub fn referenced_lines(diagnostic: &str) -> BTreeSet<usize> {
    LINE_REF_PATTERN
        .captures_iter(diagnostic)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .map(|n| n - 1)
        .collect()
}

/// Extract the annotated excerpt of `source` that `diagnostic` refers to.
///
/// References past the end of the source are ignored.
pub fn extract_context(source: &str, diagnostic: &str) -> ContextExcerpt {
    let source_lines: Vec<&str> = source.lines().collect();
    let offending: BTreeSet<usize> = referenced_lines(diagnostic)
        .into_iter()
        .filter(|i| *i < source_lines.len())
        .collect();

    let mut included = BTreeSet::new();
    for &i in &offending {
        let start = i.saturating_sub(CONTEXT_RADIUS);
        let end = (i + CONTEXT_RADIUS).min(source_lines.len() - 1);
        included.extend(start..=end);
    }

    ContextExcerpt {
        lines: included
            .into_iter()
            .map(|index| ExcerptLine {
                index,
                text: source_lines[index].to_string(),
                offending: offending.contains(&index),
            })
            .collect(),
    }
}

/// Keep only the diagnostic lines that mention `file_name`.
///
/// When no line mentions it, keeps the lines that name none of
/// `other_files`, so references from a toolchain that omits file names
/// still reach the extractor while references into another artifact never
/// land on this one.
pub fn lines_mentioning<'a>(
    diagnostic: &'a str,
    file_name: &str,
    other_files: &[&str],
) -> Cow<'a, str> {
    let matching: Vec<&str> = diagnostic
        .lines()
        .filter(|l| l.contains(file_name))
        .collect();
    if !matching.is_empty() {
        return Cow::Owned(matching.join("\n"));
    }

    let unattributed: Vec<&str> = diagnostic
        .lines()
        .filter(|l| !other_files.iter().any(|f| !f.is_empty() && l.contains(f)))
        .collect();
    if unattributed.len() == diagnostic.lines().count() {
        Cow::Borrowed(diagnostic)
    } else {
        Cow::Owned(unattributed.join("\n"))
    }
}
