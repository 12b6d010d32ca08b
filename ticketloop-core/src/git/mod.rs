//! Version-control collaborator
//!
//! The loop only needs a handful of operations on the working copy: detect
//! unpushed commits, push, sync with the remote, notice file mutations made
//! by formatters, commit, and read the staged diff.

mod repo;

pub use repo::GitRepo;

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

/// Version-control operations used by the loop
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Whether HEAD has commits its upstream branch does not
    async fn has_unpushed_commits(&self) -> Result<bool>;

    /// Push the current branch; a non-successful output is the push-failure signal
    async fn push(&self) -> Result<CommandOutput>;

    /// Fetch and pull from the remote
    async fn sync(&self) -> Result<()>;

    /// Every path that differs from the index, with a fingerprint of its contents
    async fn worktree_snapshot(&self) -> Result<WorktreeSnapshot>;

    /// Commit the working tree contents of `paths` and nothing else
    ///
    /// Whatever else is staged stays staged and out of the commit.
    async fn commit_paths(&self, message: &str, paths: &[String]) -> Result<()>;

    /// Patch of the staging area against HEAD; empty when nothing is staged
    async fn staged_diff(&self) -> Result<String>;
}

/// Unstaged and untracked paths of a working tree, keyed by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeSnapshot {
    entries: BTreeMap<String, String>,
}

impl WorktreeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path; `fingerprint` changes whenever the file's contents do
    pub fn insert(&mut self, path: impl Into<String>, fingerprint: impl Into<String>) {
        self.entries.insert(path.into(), fingerprint.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Paths whose state differs between `before` and `self`, sorted
    ///
    /// A path present only in `before` was reverted to its indexed contents,
    /// which is a change too.
    pub fn changed_since(&self, before: &WorktreeSnapshot) -> Vec<String> {
        let mut changed: Vec<String> = self
            .entries
            .iter()
            .filter(|(path, fingerprint)| before.entries.get(*path) != Some(*fingerprint))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            before
                .entries
                .keys()
                .filter(|path| !self.entries.contains_key(*path))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Run a command to completion and capture its output
    pub async fn capture(cmd: &mut Command) -> std::io::Result<Self> {
        let output = cmd.output().await?;
        Ok(Self {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end_matches('\n'), self.stderr),
        }
    }

    /// Turn a non-successful run into a sync failure
    pub(crate) fn require_success(self, what: &str) -> Result<Self> {
        self.require(what, Error::Sync)
    }

    /// Turn a non-successful run into the error built by `make`
    pub(crate) fn require(self, what: &str, make: fn(String) -> Error) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        Err(make(format!(
            "{} exited with {}: {}",
            what,
            self.code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "a signal".to_string()),
            self.combined().trim()
        )))
    }
}
