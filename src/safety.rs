//! Output path checks.
//!
//! The batch CLI writes a fresh results file. These checks stop it from
//! truncating one of its own inputs or a catalog database by mistake.

use anyhow::{bail, Result};
use std::path::Path;

/// Extensions that only ever belong to catalog databases.
const DATABASE_EXTENSIONS: [&str; 3] = ["sqlite3", "sqlite", "db"];

/// Validates that an output path is safe to overwrite.
///
/// Fails when the output has a database extension, or names the same file as
/// any of `inputs` (compared after canonicalization when both exist).
pub fn ensure_distinct_output(output: &Path, inputs: &[&Path]) -> Result<()> {
    let extension = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if DATABASE_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "Safety check failed: output '{}' looks like a catalog database",
            output.display()
        );
    }

    let output_canonical = output.canonicalize().ok();
    for input in inputs {
        let same_path = output == *input;
        let same_file = match (&output_canonical, input.canonicalize().ok()) {
            (Some(a), Some(b)) => *a == b,
            _ => false,
        };
        if same_path || same_file {
            bail!(
                "Safety check failed: output '{}' cannot be the same as input '{}'",
                output.display(),
                input.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_output() {
        let output = PathBuf::from("/tmp/resolved.jsonl");
        let input = PathBuf::from("/data/records.jsonl");
        let catalog = PathBuf::from("/data/catalog.sqlite3");
        assert!(ensure_distinct_output(&output, &[&input, &catalog]).is_ok());
    }

    #[test]
    fn test_output_equals_input() {
        let path = PathBuf::from("/data/records.jsonl");
        let result = ensure_distinct_output(&path, &[&path]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as input"));
    }

    #[test]
    fn test_same_file_through_different_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("records.jsonl");
        std::fs::write(&input, "{}\n").unwrap();
        let output = dir.path().join(".").join("records.jsonl");
        assert!(ensure_distinct_output(&output, &[&input]).is_err());
    }

    #[test]
    fn test_database_output_blocked() {
        let output = PathBuf::from("/tmp/catalog.SQLite3");
        let result = ensure_distinct_output(&output, &[]);
        assert!(result.unwrap_err().to_string().contains("catalog database"));
    }
}
