//! Repository entry naming and the per-entry detail record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use url::Url;

use super::error::{ArchiveError, Result};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;
const BYTES_PER_GIGABYTE: f64 = 1024.0 * 1024.0 * 1024.0;

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Check `repo_url` and derive the entry name it will be archived under.
///
/// Only `https://` URLs are accepted.  The name is the last `/`-separated
/// segment of the URL once trailing slashes are dropped, so
/// `https://example.com/org/widget` becomes `widget` and a `.git` suffix is
/// kept as-is.
pub fn entry_name_from_url(repo_url: &str) -> Result<String> {
    if !repo_url.starts_with("https://") {
        return Err(ArchiveError::InvalidInput(format!(
            "Invalid URL: {repo_url:?} (only https:// URLs are accepted)"
        )));
    }
    Url::parse(repo_url)
        .map_err(|e| ArchiveError::InvalidInput(format!("Invalid URL: {repo_url:?}: {e}")))?;

    let name = repo_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    validate_entry_name(name)?;
    Ok(name.to_string())
}

/// Reject names that are not exactly one directory below the archive root.
pub fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ArchiveError::InvalidInput(
            "repository name must not be empty".into(),
        ));
    }
    if name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(ArchiveError::InvalidInput(format!(
            "invalid repository name: {name:?}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Detail record
// ---------------------------------------------------------------------------

/// One row of the size listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryDetails {
    pub name: String,
    #[serde(rename = "size_MB")]
    pub size_mb: f64,
    pub last_modified: DateTime<Utc>,
    pub num_files: usize,
    pub num_subdirectories: usize,
    pub url: String,
}

pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MEGABYTE)
}

pub fn bytes_to_gigabytes(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GIGABYTE)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
