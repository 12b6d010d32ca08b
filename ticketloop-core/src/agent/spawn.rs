//! Running agent process

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::process::{Child, ChildStdout};

use crate::{Error, Result};

/// A spawned agent whose prompt has already been delivered
pub struct AgentHandle {
    child: Child,
    workdir: PathBuf,
}

impl std::fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentHandle")
            .field("workdir", &self.workdir)
            .field("pid", &self.pid())
            .finish_non_exhaustive()
    }
}

impl AgentHandle {
    pub fn new(child: Child, workdir: impl Into<PathBuf>) -> Self {
        Self {
            child,
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// OS process id; `None` once the process has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// The event stream; only the first call gets it
    pub fn take_stdout(&mut self) -> Result<ChildStdout> {
        self.child
            .stdout
            .take()
            .ok_or_else(|| Error::Agent("Agent stdout was already taken".to_string()))
    }

    /// Block until the agent exits
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        Ok(self.child.wait().await?)
    }
}
