//! Git client seam and its command-line implementation.
//!
//! The archive manager only talks to git through [`VcsClient`].  [`GitCli`]
//! shells out to the system `git` binary using `tokio::process::Command`;
//! tests substitute an in-process fake.

pub mod commands;
#[cfg(test)]
pub mod fake;

use std::path::Path;

use async_trait::async_trait;

pub use commands::{FetchResult, GitCli};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a single git invocation.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// The git binary could not be started at all.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    /// git ran and exited non-zero.  `stderr` is the client's own diagnostic.
    #[error("{stderr}")]
    Failed { command: String, stderr: String },
}

impl GitError {
    /// The git invocation that failed, e.g. `git clone`.
    pub fn command(&self) -> &str {
        match self {
            GitError::Spawn { command, .. } | GitError::Failed { command, .. } => command,
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The subset of version-control operations the archive needs.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// `git clone <url> <dest>`.
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError>;

    /// `git -C <repo> fetch` against the configured remote.
    async fn fetch(&self, repo: &Path) -> Result<FetchResult, GitError>;

    /// `git -C <repo> diff --shortstat <range>`, trimmed.
    async fn diff_shortstat(&self, repo: &Path, range: &str) -> Result<String, GitError>;

    /// `git -C <repo> merge <rev>`.
    async fn merge(&self, repo: &Path, rev: &str) -> Result<(), GitError>;

    /// `git -C <repo> config --get remote.origin.url`, trimmed.
    async fn origin_url(&self, repo: &Path) -> Result<String, GitError>;

    /// `git --version`, trimmed.
    async fn version(&self) -> Result<String, GitError>;
}
