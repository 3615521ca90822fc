//! Archive operations.
//!
//! Every operation first makes sure the archive root exists.  Batch
//! operations walk entries in sorted name order and stop at the first
//! failure; entries already touched stay as they are.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument};

use super::entry::{bytes_to_gigabytes, bytes_to_megabytes, entry_name_from_url, validate_entry_name};
use super::error::{ArchiveError, Result};
use super::scan;
use super::EntryDetails;
use crate::config::{ArchiveConfig, SizeMode};
use crate::git::VcsClient;

/// Entry name to `git diff --shortstat` output, in processing order.
pub type UpdateSummary = BTreeMap<String, String>;

/// Result of the size listing.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeReport {
    pub entries: Vec<EntryDetails>,
    pub total_bytes: u64,
}

impl SizeReport {
    pub fn total_size_gigabytes(&self) -> f64 {
        bytes_to_gigabytes(self.total_bytes)
    }
}

// ---------------------------------------------------------------------------
// ArchiveManager
// ---------------------------------------------------------------------------

/// Owns the archive root and the git client used on it.
#[derive(Clone)]
pub struct ArchiveManager {
    root: PathBuf,
    size_mode: SizeMode,
    vcs: Arc<dyn VcsClient>,
}

impl ArchiveManager {
    pub fn new(config: &ArchiveConfig, vcs: Arc<dyn VcsClient>) -> Self {
        Self {
            root: PathBuf::from(&config.root),
            size_mode: config.size_mode,
            vcs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vcs(&self) -> &dyn VcsClient {
        self.vcs.as_ref()
    }

    async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            ArchiveError::io(
                format!("failed to create archive root {}", self.root.display()),
                e,
            )
        })
    }

    /// Ensure the root exists and return its children's names, sorted.
    async fn entry_names(&self) -> Result<Vec<OsString>> {
        self.ensure_root().await?;
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan::list_names(&root))
            .await?
            .map_err(|e| {
                ArchiveError::io(
                    format!("failed to list archive root {}", self.root.display()),
                    e,
                )
            })
    }

    // -- single entry -------------------------------------------------------

    /// Clone `repo_url` into the archive, replacing any entry of the same
    /// name.  Returns the entry path.
    #[instrument(skip(self))]
    pub async fn archive(&self, repo_url: &str) -> Result<PathBuf> {
        let name = entry_name_from_url(repo_url)?;
        self.ensure_root().await?;

        let path = self.root.join(&name);
        remove_path(&path).await?;

        self.vcs.clone_repo(repo_url, &path).await?;
        info!(entry = %name, path = %path.display(), "repository archived");
        Ok(path)
    }

    /// Remove the entry called `repo_name`.  Removing an absent entry
    /// succeeds.  Returns the entry path.
    #[instrument(skip(self))]
    pub async fn remove(&self, repo_name: &str) -> Result<PathBuf> {
        validate_entry_name(repo_name)?;
        self.ensure_root().await?;

        let path = self.root.join(repo_name);
        if remove_path(&path).await? {
            info!(entry = %repo_name, "repository removed");
        } else {
            debug!(entry = %repo_name, "nothing to remove");
        }
        Ok(path)
    }

    // -- listings -----------------------------------------------------------

    /// Every immediate child of the archive root, including plain files.
    pub async fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .entry_names()
            .await?
            .iter()
            .map(|name| display_name(name))
            .collect())
    }

    /// Size, counts, mtime and origin URL of every entry directory.
    ///
    /// A single entry whose origin URL cannot be read fails the whole report.
    #[instrument(skip(self))]
    pub async fn list_with_sizes(&self) -> Result<SizeReport> {
        let mut entries = Vec::new();
        let mut total_bytes: u64 = 0;

        for os_name in self.entry_names().await? {
            let path = self.root.join(&os_name);
            let name = display_name(&os_name);
            let is_dir = tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let mode = self.size_mode;
            let scan_path = path.clone();
            let stats = tokio::task::spawn_blocking(move || scan::scan_entry(&scan_path, mode))
                .await?
                .map_err(|e| ArchiveError::io(format!("failed to scan {}", path.display()), e))?;

            let url = self.vcs.origin_url(&path).await?;

            total_bytes += stats.size_bytes;
            entries.push(EntryDetails {
                name,
                size_mb: bytes_to_megabytes(stats.size_bytes),
                last_modified: DateTime::<Utc>::from(stats.last_modified),
                num_files: stats.num_files,
                num_subdirectories: stats.num_subdirectories,
                url,
            });
        }

        debug!(entries = entries.len(), total_bytes, "size report built");
        Ok(SizeReport {
            entries,
            total_bytes,
        })
    }

    // -- batch operations ---------------------------------------------------

    /// Fetch, summarise and merge upstream changes into every entry.
    #[instrument(skip(self))]
    pub async fn update_all(&self) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::new();

        for os_name in self.entry_names().await? {
            let path = self.root.join(&os_name);
            let name = display_name(&os_name);

            let fetched = self.vcs.fetch(&path).await?;
            let stat = self.vcs.diff_shortstat(&path, "HEAD..FETCH_HEAD").await?;
            self.vcs.merge(&path, "FETCH_HEAD").await?;

            info!(
                entry = %name,
                refs_updated = fetched.refs_updated,
                diff = %stat,
                "repository updated"
            );
            summary.insert(name, stat);
        }

        Ok(summary)
    }

    /// Delete and freshly clone every entry from its recorded origin URL.
    ///
    /// Returns the number of entries recloned.  A clone failure leaves that
    /// entry deleted.
    #[instrument(skip(self))]
    pub async fn reclone_all(&self) -> Result<usize> {
        let mut recloned = 0;

        for os_name in self.entry_names().await? {
            let path = self.root.join(&os_name);
            let name = display_name(&os_name);

            let url = self.vcs.origin_url(&path).await?;
            remove_path(&path).await?;
            if let Err(e) = self.vcs.clone_repo(&url, &path).await {
                error!(entry = %name, %url, "reclone failed; entry left absent");
                return Err(e.into());
            }

            info!(entry = %name, %url, "repository recloned");
            recloned += 1;
        }

        Ok(recloned)
    }
}

/// Entry name as reported to callers; non-UTF-8 bytes are replaced.
fn display_name(name: &OsStr) -> String {
    name.to_string_lossy().into_owned()
}

/// Remove a directory tree (or a plain file) at `path`.  Returns whether
/// anything was there.
async fn remove_path(path: &Path) -> Result<bool> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(ArchiveError::io(
                format!("failed to inspect {}", path.display()),
                e,
            ))
        }
    };

    let removed = if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };
    removed.map_err(|e| ArchiveError::io(format!("failed to remove {}", path.display()), e))?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
