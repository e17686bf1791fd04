use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use coordination::ArtifactPair;
use std::path::{Path, PathBuf};

/// Characters of the requirement kept in the directory name
const NAME_CHARS: usize = 20;

/// Directory-name form of a requirement: first 20 chars, lowercase, `_` for spaces
pub fn safe_name(requirement: &str) -> String {
    requirement
        .chars()
        .take(NAME_CHARS)
        .map(|c| match c {
            ' ' => '_',
            c if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_lowercase()
}

/// Write `pair` to `<designs_dir>/<YYYYmmdd_HHMMSS>_<safe_name>/{design.v,testbench.v}`
pub fn save_design(
    designs_dir: &Path,
    requirement: &str,
    pair: &ArtifactPair,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    let dir = designs_dir.join(format!(
        "{}_{}",
        now.format("%Y%m%d_%H%M%S"),
        safe_name(requirement)
    ));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for (file, text) in [("design.v", &pair.design), ("testbench.v", &pair.test)] {
        let path = dir.join(file);
        std::fs::write(&path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    tracing::info!(path = %dir.display(), "Saved design");
    Ok(dir)
}
