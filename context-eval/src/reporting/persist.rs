//! JSON result files

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cases::TestResult;

const SLUG_WIDTH: usize = 40;
const REPORT_STEM: &str = "report";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Every result of a run in one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedReport {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub test_count: usize,
    pub results: Vec<TestResult>,
}

/// Lowercase, spaces and hyphens to underscores, at most 40 characters.
/// Path separators and other characters that are unsafe in filenames
/// also become underscores.
pub fn slugify(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(SLUG_WIDTH)
        .collect();

    if slug.is_empty() {
        "test".to_string()
    } else {
        slug
    }
}

/// First `{prefix}_{slug}[_n]` not yet taken in this batch or on disk
fn unique_path(dir: &Path, prefix: &str, slug: &str, taken: &mut HashSet<String>) -> PathBuf {
    let mut candidate = slug.to_string();
    let mut n = 1;
    loop {
        let path = dir.join(format!("{}_{}.json", prefix, candidate));
        if !taken.contains(&candidate) && !path.exists() {
            taken.insert(candidate);
            return path;
        }
        n += 1;
        candidate = format!("{}_{}", slug, n);
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write one file per result plus `{timestamp}_report.json`.
///
/// Returns the written paths, the combined report last. The report claims
/// its name first. Any file whose name is already taken, in this batch or
/// on disk, gets `_2`, `_3`, ... appended instead of being overwritten.
pub fn persist(
    results: &[TestResult],
    output_dir: &Path,
    model: &str,
    timestamp: DateTime<Utc>,
) -> Result<Vec<PathBuf>, PersistError> {
    fs::create_dir_all(output_dir).map_err(|source| PersistError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let prefix = timestamp.format("%Y%m%d_%H%M%S").to_string();
    let mut taken = HashSet::new();
    let mut written = Vec::with_capacity(results.len() + 1);
    let report_path = unique_path(output_dir, &prefix, REPORT_STEM, &mut taken);

    for result in results {
        let path = unique_path(output_dir, &prefix, &slugify(&result.name), &mut taken);
        write_json(&path, result)?;
        tracing::debug!("Wrote {}", path.display());
        written.push(path);
    }

    let report = CombinedReport {
        timestamp,
        model: model.to_string(),
        test_count: results.len(),
        results: results.to_vec(),
    };
    write_json(&report_path, &report)?;
    written.push(report_path);

    Ok(written)
}
