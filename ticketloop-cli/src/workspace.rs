//! Resolves the repository and builds the loop's collaborators

use std::path::{Path, PathBuf};

use anyhow::Context;
use ticketloop_core::config::{CliOverrides, GitConfig};
use ticketloop_core::{
    AgentInvoker, ClaudeBackend, Config, DryRunInvoker, GitRepo, GuidanceLibrary, LoopContext,
    LoopSettings, ShellGates, StreamingInvoker,
};
use ticketloop_github::GitHubClient;

/// A repository plus its effective configuration
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Find the repository containing `workdir` and load its configuration
    pub fn open(workdir: &Path, overrides: CliOverrides) -> anyhow::Result<Self> {
        let workdir = if workdir.is_absolute() {
            workdir.to_path_buf()
        } else {
            std::env::current_dir()?.join(workdir)
        };

        let root = GitRepo::open(&workdir, GitConfig::default().remote)?
            .root()
            .to_path_buf();
        let config = Config::load_with_overrides(&root, overrides)?;

        tracing::debug!(
            root = %root.display(),
            claude_path = %config.agent.claude_path,
            model = ?config.agent.model,
            "Configuration loaded"
        );

        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn repo(&self) -> anyhow::Result<GitRepo> {
        Ok(GitRepo::open(&self.root, self.config.git.remote.clone())?)
    }

    /// GitHub client for the configured repository, or the one behind the git remote
    pub fn tracker(&self) -> anyhow::Result<GitHubClient> {
        let reference = match &self.config.tracker.repo {
            Some(repo) => repo.clone(),
            None => self
                .repo()?
                .remote_url()
                .context("No tracker repository configured; pass --repo owner/repo")?,
        };
        Ok(GitHubClient::from_url(&reference)?)
    }

    /// Build the context every cycle runs against
    pub fn loop_context(&self, dry_run: bool, verbose: bool) -> anyhow::Result<LoopContext> {
        let agent: Box<dyn AgentInvoker> = if dry_run {
            Box::new(DryRunInvoker::stdout())
        } else {
            let backend = ClaudeBackend::from_config(&self.config.agent);
            Box::new(StreamingInvoker::new(Box::new(backend), &self.root, verbose))
        };

        Ok(LoopContext {
            vcs: Box::new(self.repo()?),
            tracker: Box::new(self.tracker()?),
            agent,
            gates: Box::new(ShellGates::new(&self.root, self.config.gates.clone())),
            guidance: GuidanceLibrary::new(&self.root, self.config.guidance.clone()),
            settings: LoopSettings::from_config(&self.config),
        })
    }
}
