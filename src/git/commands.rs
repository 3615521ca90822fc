//! [`VcsClient`] implementation backed by the system `git` binary.
//!
//! Every call spawns a fresh child process with stdin closed and
//! `GIT_TERMINAL_PROMPT=0`, waits for it to exit, and turns a non-zero exit
//! into [`GitError::Failed`] carrying git's stderr untouched.  No timeout is
//! applied; a hung child hangs the caller.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::{GitError, VcsClient};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Summary of a `git fetch` operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    /// Number of refs that were updated (new or changed).
    pub refs_updated: usize,
}

/// Runs git as a child process.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
}

impl GitCli {
    /// Use `binary` (a bare name resolved through `PATH`, or a full path).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// A command preset with `-C <repo>`.
    fn command_in(&self, repo: &Path) -> Command {
        let mut cmd = self.command();
        cmd.arg("-C").arg(repo);
        cmd
    }

    /// Wait for `cmd` and return `(stdout, stderr)` on a zero exit.
    async fn run(&self, mut cmd: Command, label: &str) -> Result<(String, String), GitError> {
        debug!(command = label, "spawning git");

        let output = cmd.output().await.map_err(|source| GitError::Spawn {
            command: label.to_string(),
            source,
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            warn!(
                command = label,
                status = %output.status,
                stderr = %stderr.trim(),
                "git exited with non-zero status"
            );
            let stderr = if stderr.trim().is_empty() {
                format!("{label} exited with {}", output.status)
            } else {
                stderr
            };
            return Err(GitError::Failed {
                command: label.to_string(),
                stderr,
            });
        }

        Ok((String::from_utf8_lossy(&output.stdout).into_owned(), stderr))
    }
}

#[async_trait]
impl VcsClient for GitCli {
    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        let mut cmd = self.command();
        cmd.arg("clone").arg(url).arg(dest);
        self.run(cmd, "git clone").await?;
        debug!("git clone succeeded");
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo.display()))]
    async fn fetch(&self, repo: &Path) -> Result<FetchResult, GitError> {
        let mut cmd = self.command_in(repo);
        cmd.arg("fetch");
        let (_, stderr) = self.run(cmd, "git fetch").await?;

        let result = FetchResult {
            refs_updated: count_updated_refs(&stderr),
        };
        debug!(refs_updated = result.refs_updated, "git fetch complete");
        Ok(result)
    }

    #[instrument(skip(self), fields(repo = %repo.display()))]
    async fn diff_shortstat(&self, repo: &Path, range: &str) -> Result<String, GitError> {
        let mut cmd = self.command_in(repo);
        cmd.args(["diff", "--shortstat", range]);
        let (stdout, _) = self.run(cmd, "git diff --shortstat").await?;
        Ok(stdout.trim().to_string())
    }

    #[instrument(skip(self), fields(repo = %repo.display()))]
    async fn merge(&self, repo: &Path, rev: &str) -> Result<(), GitError> {
        let mut cmd = self.command_in(repo);
        cmd.arg("merge").arg(rev);
        self.run(cmd, "git merge").await?;
        Ok(())
    }

    #[instrument(skip(self), fields(repo = %repo.display()))]
    async fn origin_url(&self, repo: &Path) -> Result<String, GitError> {
        let mut cmd = self.command_in(repo);
        cmd.args(["config", "--get", "remote.origin.url"]);
        let (stdout, _) = self.run(cmd, "git config --get remote.origin.url").await?;
        Ok(stdout.trim().to_string())
    }

    async fn version(&self) -> Result<String, GitError> {
        let mut cmd = self.command();
        cmd.arg("--version");
        let (stdout, _) = self.run(cmd, "git --version").await?;
        Ok(stdout.trim().to_string())
    }
}

/// Count the number of ref-update lines in `git fetch` stderr.
///
/// Lines matching patterns like ` -> ` or `[new branch]` are counted.
fn count_updated_refs(stderr: &str) -> usize {
    stderr
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.contains("->") && !trimmed.starts_with("From")
        })
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Run git synchronously for test fixtures, with an identity configured.
    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn make_origin(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        git(dir, &["init", "--quiet"]);
        std::fs::write(dir.join("a.txt"), "alpha\n").unwrap();
        git(dir, &["add", "a.txt"]);
        git(dir, &["commit", "--quiet", "-m", "initial"]);
    }

    #[test]
    fn count_updated_refs_basic() {
        let stderr = "\
From https://example.com/org/repo
   abc1234..def5678  main       -> origin/main
 * [new branch]      feature-x  -> origin/feature-x
";
        assert_eq!(count_updated_refs(stderr), 2);
    }

    #[test]
    fn count_updated_refs_empty() {
        assert_eq!(count_updated_refs(""), 0);
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let cli = GitCli::new("/nonexistent/bin/git-for-repo-archive-tests");
        let err = cli.version().await.unwrap_err();
        assert!(matches!(err, GitError::Spawn { .. }));
    }

    #[tokio::test]
    async fn clone_records_origin_url() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("origin");
        make_origin(&origin);

        let cli = GitCli::new("git");
        let dest = tmp.path().join("archive").join("origin");
        let url = origin.to_string_lossy().into_owned();
        cli.clone_repo(&url, &dest).await.unwrap();

        assert!(dest.join("a.txt").is_file());
        assert_eq!(cli.origin_url(&dest).await.unwrap(), url);
    }

    #[tokio::test]
    async fn clone_failure_carries_stderr() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let cli = GitCli::new("git");
        let missing = tmp.path().join("does-not-exist");
        let err = cli
            .clone_repo(&missing.to_string_lossy(), &tmp.path().join("dest"))
            .await
            .unwrap_err();
        match err {
            GitError::Failed { command, stderr, .. } => {
                assert_eq!(command, "git clone");
                assert!(!stderr.trim().is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn origin_url_outside_repo_fails() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let plain = tmp.path().join("plain");
        std::fs::create_dir(&plain).unwrap();
        let err = GitCli::new("git").origin_url(&plain).await.unwrap_err();
        assert!(matches!(err, GitError::Failed { .. }));
    }

    #[tokio::test]
    async fn fetch_diff_merge_pick_up_new_commit() {
        if !git_available() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let origin = tmp.path().join("origin");
        make_origin(&origin);

        let cli = GitCli::new("git");
        let dest = tmp.path().join("clone");
        cli.clone_repo(&origin.to_string_lossy(), &dest)
            .await
            .unwrap();

        // Nothing new upstream yet.
        cli.fetch(&dest).await.unwrap();
        let stat = cli.diff_shortstat(&dest, "HEAD..FETCH_HEAD").await.unwrap();
        assert_eq!(stat, "");
        cli.merge(&dest, "FETCH_HEAD").await.unwrap();

        std::fs::write(origin.join("b.txt"), "beta\n").unwrap();
        git(&origin, &["add", "b.txt"]);
        git(&origin, &["commit", "--quiet", "-m", "second"]);

        cli.fetch(&dest).await.unwrap();
        let stat = cli.diff_shortstat(&dest, "HEAD..FETCH_HEAD").await.unwrap();
        assert!(stat.contains("1 file changed"), "unexpected shortstat: {stat}");

        cli.merge(&dest, "FETCH_HEAD").await.unwrap();
        assert!(dest.join("b.txt").is_file());
    }
}
