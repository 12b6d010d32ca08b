//! Git repository backed by libgit2 for inspection and the git CLI for sync

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use git2::{Branch, Delta, DiffFormat, DiffOptions, ErrorCode, ObjectType, Oid, Repository};
use tokio::process::Command;
use tracing::{debug, info};

use super::{CommandOutput, Vcs, WorktreeSnapshot};
use crate::{Error, Result};

/// A git working copy
///
/// Read-only inspection goes through git2. Anything that talks to the remote
/// or rewrites history shells out to `git` so the user's credential helpers,
/// hooks and signing config apply.
#[derive(Debug, Clone)]
pub struct GitRepo {
    /// Path to the repository root
    root: PathBuf,
    /// Remote used for fetch, pull and push
    remote: String,
}

impl GitRepo {
    /// Open a git repository at the given path
    ///
    /// This will search upward from the given path to find the repository root.
    pub fn open(path: impl AsRef<Path>, remote: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::discover(path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                Error::Config(format!(
                    "Not a git repository: {}. Run 'git init' first or navigate to a git repository.",
                    path.display()
                ))
            } else {
                Error::from(e)
            }
        })?;

        let root = repo
            .workdir()
            .ok_or_else(|| Error::Config("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self {
            root,
            remote: remote.into(),
        })
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the remote the loop syncs with
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// URL of the configured remote
    pub fn remote_url(&self) -> Result<String> {
        let repo = self.repository()?;
        let remote = repo.find_remote(&self.remote).map_err(|e| {
            Error::Config(format!("Remote '{}' not found: {}", self.remote, e))
        })?;
        remote
            .url()
            .map(str::to_string)
            .ok_or_else(|| Error::Config(format!("Remote '{}' has no URL", self.remote)))
    }

    /// Open a fresh libgit2 handle; `Repository` is not `Sync`, so none is kept around
    fn repository(&self) -> Result<Repository> {
        Ok(Repository::open(&self.root)?)
    }

    async fn git(&self, args: &[&str]) -> Result<CommandOutput> {
        debug!(args = ?args, "Running git");
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0");

        CommandOutput::capture(&mut cmd)
            .await
            .map_err(|e| Error::Sync(format!("Failed to run git {}: {}", args.join(" "), e)))
    }

    /// The subset of `paths` that exist on disk but are not in the index
    fn untracked(&self, paths: &[String]) -> Result<Vec<String>> {
        let index = self.repository()?.index()?;
        Ok(paths
            .iter()
            .filter(|p| index.get_path(Path::new(p.as_str()), 0).is_none())
            .filter(|p| self.root.join(p.as_str()).exists())
            .cloned()
            .collect())
    }
}

/// Render a diff in unified patch format
fn patch_text(diff: &git2::Diff<'_>) -> Result<String> {
    let mut out = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            out.push(line.origin());
        }
        out.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(out)
}

#[async_trait]
impl Vcs for GitRepo {
    async fn has_unpushed_commits(&self) -> Result<bool> {
        let repo = self.repository()?;

        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if !head.is_branch() {
            debug!("Detached HEAD, nothing to push");
            return Ok(false);
        }

        let branch = Branch::wrap(head);
        let upstream = match branch.upstream() {
            Ok(upstream) => upstream,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!("Branch has no upstream, nothing to push");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let (Some(local), Some(remote)) = (branch.get().target(), upstream.get().target()) else {
            return Ok(false);
        };

        let (ahead, behind) = repo.graph_ahead_behind(local, remote)?;
        debug!(ahead, behind, "Compared HEAD with upstream");
        Ok(ahead > 0)
    }

    async fn push(&self) -> Result<CommandOutput> {
        info!(remote = %self.remote, "Pushing");
        self.git(&["push", &self.remote, "HEAD"]).await
    }

    async fn sync(&self) -> Result<()> {
        info!(remote = %self.remote, "Fetching and pulling");
        self.git(&["fetch", &self.remote])
            .await?
            .require_success("git fetch")?;
        self.git(&["pull", "--no-edit", &self.remote])
            .await?
            .require_success("git pull")?;
        Ok(())
    }

    async fn worktree_snapshot(&self) -> Result<WorktreeSnapshot> {
        let repo = self.repository()?;
        let mut opts = DiffOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);

        let diff = repo.diff_index_to_workdir(None, Some(&mut opts))?;
        let mut snapshot = WorktreeSnapshot::new();
        for delta in diff.deltas() {
            let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
                continue;
            };
            let fingerprint = match delta.status() {
                Delta::Deleted => "deleted".to_string(),
                _ => Oid::hash_file(ObjectType::Blob, self.root.join(path))?.to_string(),
            };
            snapshot.insert(path.to_string_lossy(), fingerprint);
        }
        Ok(snapshot)
    }

    async fn commit_paths(&self, message: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        info!(message, paths = ?paths, "Committing paths");

        // --only needs new files known to the index; intent-to-add stages no content
        let untracked = self.untracked(paths)?;
        if !untracked.is_empty() {
            let mut args = vec!["add", "--intent-to-add", "--"];
            args.extend(untracked.iter().map(String::as_str));
            self.git(&args).await?.require("git add", Error::Commit)?;
        }

        let mut args = vec!["commit", "--only", "-m", message, "--"];
        args.extend(paths.iter().map(String::as_str));
        self.git(&args).await?.require("git commit", Error::Commit)?;
        Ok(())
    }

    async fn staged_diff(&self) -> Result<String> {
        let repo = self.repository()?;

        let head_tree = match repo.head() {
            Ok(head) => Some(head.peel_to_tree()?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        let diff = repo.diff_tree_to_index(head_tree.as_ref(), None, None)?;
        patch_text(&diff)
    }
}
