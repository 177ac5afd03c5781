//! Roster file loading.
//!
//! One entry per line. Blank lines and `#` comments are skipped; entries are
//! trimmed but otherwise kept as written.

use anyhow::{Context, Result};
use std::path::Path;

pub fn parse_roster(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_roster_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read roster {}", path.display()))?;
    Ok(parse_roster(&text))
}
