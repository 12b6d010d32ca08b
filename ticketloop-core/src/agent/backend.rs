//! Agent backends: how a coding agent process is launched

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::AgentConfig;
use crate::{Error, Result};

use super::spawn::AgentHandle;

/// A coding agent the loop can launch
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// The command line, with stdio wiring, before the prompt is attached
    fn build_command(&self, workdir: &Path) -> Command;

    /// Launch the agent in `workdir` and feed it the prompt
    async fn spawn(&self, prompt: &str, workdir: &Path) -> Result<AgentHandle>;
}

/// Claude Code backend
///
/// Always runs non-interactively with permission prompts disabled: the loop
/// has no human to answer them. Anything the agent does inside the working
/// copy is trusted.
#[derive(Debug, Clone)]
pub struct ClaudeBackend {
    pub claude_path: String,
    pub model: Option<String>,
    pub allowed_tools: Vec<String>,
}

impl ClaudeBackend {
    /// `claude` from PATH with the CLI's default model
    pub fn new() -> Self {
        Self {
            claude_path: "claude".to_string(),
            model: None,
            allowed_tools: Vec::new(),
        }
    }

    /// Settings from the `[agent]` config section
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            claude_path: config.claude_path.clone(),
            model: config.model.clone(),
            allowed_tools: config.allowed_tools.clone(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.claude_path = path.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl Default for ClaudeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for ClaudeBackend {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn build_command(&self, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.claude_path);
        cmd.arg("--print")
            .arg("--verbose")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--dangerously-skip-permissions");

        if let Some(ref model) = self.model {
            cmd.arg("--model").arg(model);
        }

        if !self.allowed_tools.is_empty() {
            cmd.arg("--allowed-tools").arg(self.allowed_tools.join(","));
        }

        // The prompt goes over stdin; argv has a per-argument size cap
        cmd.current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        cmd
    }

    async fn spawn(&self, prompt: &str, workdir: &Path) -> Result<AgentHandle> {
        if !workdir.is_dir() {
            return Err(Error::Agent(format!(
                "Agent working directory {} is not a directory",
                workdir.display()
            )));
        }

        let mut child = self.build_command(workdir).spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::Agent(format!(
                "Could not find the claude executable at '{}'; set agent.claude_path or --claude-path",
                self.claude_path
            )),
            _ => Error::Io(e),
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Agent("Agent stdin is not captured".to_string()))?;
        stdin.write_all(prompt.as_bytes()).await?;
        stdin.shutdown().await?;
        drop(stdin);

        Ok(AgentHandle::new(child, workdir))
    }
}
