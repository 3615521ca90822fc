//! In-process [`VcsClient`] used by tests.
//!
//! A "clone" creates the destination directory with a `README.md` and an
//! `ORIGIN` marker holding the URL; `origin_url` reads the marker back.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{FetchResult, GitError, VcsClient};

pub const ORIGIN_MARKER: &str = "ORIGIN";

#[derive(Debug, Default)]
pub struct FakeGit {
    calls: Mutex<Vec<String>>,
    failing_urls: Mutex<HashSet<String>>,
    failing_fetches: Mutex<HashSet<String>>,
    shortstat: Mutex<String>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later clone of `url` fail.
    pub fn fail_clone_of(&self, url: &str) {
        self.failing_urls.lock().unwrap().insert(url.to_string());
    }

    /// Make every later fetch in the entry named `name` fail.
    pub fn fail_fetch_in(&self, name: &str) {
        self.failing_fetches
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    pub fn set_shortstat(&self, stat: &str) {
        *self.shortstat.lock().unwrap() = stat.to_string();
    }

    /// Calls recorded so far, as `"<op> <entry name or url>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, target: &str) {
        self.calls.lock().unwrap().push(format!("{op} {target}"));
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn failed(command: &str, stderr: &str) -> GitError {
    GitError::Failed {
        command: command.to_string(),
        stderr: stderr.to_string(),
    }
}

fn io_failure(source: std::io::Error) -> GitError {
    GitError::Spawn {
        command: "git clone".to_string(),
        source,
    }
}

#[async_trait]
impl VcsClient for FakeGit {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        self.record("clone", url);
        if self.failing_urls.lock().unwrap().contains(url) {
            return Err(failed(
                "git clone",
                &format!("fatal: repository '{url}' not found\n"),
            ));
        }
        std::fs::create_dir_all(dest).map_err(io_failure)?;
        std::fs::write(dest.join(ORIGIN_MARKER), url).map_err(io_failure)?;
        std::fs::write(dest.join("README.md"), "# fixture\n").map_err(io_failure)?;
        Ok(())
    }

    async fn fetch(&self, repo: &Path) -> Result<FetchResult, GitError> {
        let name = entry_name(repo);
        self.record("fetch", &name);
        if !repo.is_dir() {
            return Err(failed(
                "git fetch",
                &format!("fatal: cannot change to '{}': No such file or directory\n", repo.display()),
            ));
        }
        if self.failing_fetches.lock().unwrap().contains(&name) {
            return Err(failed("git fetch", "fatal: unable to access remote\n"));
        }
        Ok(FetchResult::default())
    }

    async fn diff_shortstat(&self, repo: &Path, _range: &str) -> Result<String, GitError> {
        self.record("diff", &entry_name(repo));
        Ok(self.shortstat.lock().unwrap().clone())
    }

    async fn merge(&self, repo: &Path, _rev: &str) -> Result<(), GitError> {
        self.record("merge", &entry_name(repo));
        Ok(())
    }

    async fn origin_url(&self, repo: &Path) -> Result<String, GitError> {
        self.record("origin", &entry_name(repo));
        std::fs::read_to_string(repo.join(ORIGIN_MARKER))
            .map(|url| url.trim().to_string())
            .map_err(|_| {
                failed(
                    "git config --get remote.origin.url",
                    "fatal: not a git repository\n",
                )
            })
    }

    async fn version(&self) -> Result<String, GitError> {
        Ok("git version 0.0.0-fake".to_string())
    }
}
