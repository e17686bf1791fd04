//! Unified line diffs between artifact versions

use similar::TextDiff;
use std::borrow::Cow;

/// Unified diff of `old` against `new` with `context` lines around each change.
///
/// Empty when the texts have the same lines. A missing final newline does
/// not count as a change.
pub fn unified_diff(old: &str, new: &str, context: usize) -> String {
    let old = terminated(old);
    let new = terminated(new);
    TextDiff::from_lines(old.as_ref(), new.as_ref())
        .unified_diff()
        .context_radius(context)
        .header("previous", "updated")
        .to_string()
}

fn terminated(text: &str) -> Cow<'_, str> {
    if text.is_empty() || text.ends_with('\n') {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{text}\n"))
    }
}
