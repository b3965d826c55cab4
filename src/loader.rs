//! Reading suite documents from disk.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::{Error, Result};

/// Expand file paths and glob patterns, preserving argument order.
///
/// A plain path must exist; a pattern must match at least one file.
/// Matches of a single pattern are sorted and duplicates dropped.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let is_glob = pattern.contains(['*', '?', '[']);
        if !is_glob {
            let path = PathBuf::from(pattern);
            if !path.is_file() {
                return Err(Error::Config(format!("Test file not found: {pattern}")));
            }
            if !files.contains(&path) {
                files.push(path);
            }
            continue;
        }

        let mut matches: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| Error::Config(format!("Invalid glob pattern '{pattern}': {e}")))?
            .filter_map(std::result::Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            return Err(Error::Config(format!("No files match pattern: {pattern}")));
        }
        matches.sort();
        for path in matches {
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

/// Read one document, as YAML for `.yaml`/`.yml` and JSON otherwise.
pub fn load_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read '{}': {e}", path.display())))?;

    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid YAML in '{}': {e}", path.display())))?,
        _ => serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid JSON in '{}': {e}", path.display())))?,
    };
    debug!(path = %path.display(), "Loaded document");
    Ok(value)
}

/// Expand patterns and read every matched document in order.
pub fn load_documents(patterns: &[String]) -> Result<Vec<Value>> {
    expand_patterns(patterns)?
        .iter()
        .map(|path| load_document(path))
        .collect()
}
