//! Test case loading from a directory of JSON definitions
//!
//! Each `<id>.json` file holds one [`TestCase`]; the file stem is the
//! identifier used on the command line.

use std::path::{Path, PathBuf};

use super::TestCase;

const DEFINITION_EXT: &str = "json";

/// Error type for test case loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("test-cases directory not found at {0}")]
    MissingDirectory(PathBuf),

    #[error("Test case not found: {name}")]
    NotFound { name: String, available: Vec<String> },

    #[error("Malformed test case {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which test cases to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every definition in the directory, sorted by identifier
    All,
    /// One definition by identifier (file stem)
    Named(String),
}

fn ensure_dir(dir: &Path) -> Result<(), LoadError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(LoadError::MissingDirectory(dir.to_path_buf()))
    }
}

/// List test identifiers found in `dir`, sorted
pub fn discover_test_cases(dir: impl AsRef<Path>) -> Result<Vec<String>, LoadError> {
    let dir = dir.as_ref();
    ensure_dir(dir)?;

    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(DEFINITION_EXT) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            ids.push(stem.to_string());
        }
    }

    ids.sort();
    Ok(ids)
}

/// Parse a single definition file
pub fn load_test_case_file(path: impl AsRef<Path>) -> Result<TestCase, LoadError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| LoadError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load the definition named `id` from `dir`
pub fn load_test_case(dir: impl AsRef<Path>, id: &str) -> Result<TestCase, LoadError> {
    let dir = dir.as_ref();
    ensure_dir(dir)?;

    let path = dir.join(format!("{}.{}", id, DEFINITION_EXT));
    if !path.is_file() {
        return Err(LoadError::NotFound {
            name: id.to_string(),
            available: discover_test_cases(dir)?,
        });
    }

    load_test_case_file(&path)
}

/// Resolve a selection to loaded test cases, keyed by identifier.
///
/// Every definition is parsed here, so a malformed file is reported before
/// any request is sent.
pub fn resolve_selection(
    dir: impl AsRef<Path>,
    selection: &Selection,
) -> Result<Vec<(String, TestCase)>, LoadError> {
    let dir = dir.as_ref();
    let ids = match selection {
        Selection::All => discover_test_cases(dir)?,
        Selection::Named(id) => vec![id.clone()],
    };

    ids.into_iter()
        .map(|id| {
            let case = load_test_case(dir, &id)?;
            tracing::debug!("Loaded test case {} ({})", id, case.name);
            Ok((id, case))
        })
        .collect()
}
