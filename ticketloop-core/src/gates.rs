//! Quality gate collaborators
//!
//! Each gate is a single shell command that passes or fails. Format and lint
//! gates may also rewrite files; detecting that is the caller's job.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::GatesConfig;
use crate::git::CommandOutput;
use crate::{Error, Result};

/// A quality gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Format,
    Lint,
    Install,
    Migrate,
    UnitTests,
    E2eTests,
    Typecheck,
}

impl Gate {
    pub fn name(&self) -> &'static str {
        match self {
            Gate::Format => "format",
            Gate::Lint => "lint",
            Gate::Install => "install",
            Gate::Migrate => "migrate",
            Gate::UnitTests => "unit-tests",
            Gate::E2eTests => "e2e-tests",
            Gate::Typecheck => "typecheck",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Passed,
    Failed,
    /// No command configured
    Skipped,
}

/// Outcome of running one gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub gate: Gate,
    pub status: GateStatus,
    /// Combined stdout and stderr
    pub output: String,
    pub duration_ms: u64,
}

impl GateResult {
    pub fn passed(gate: Gate) -> Self {
        Self {
            gate,
            status: GateStatus::Passed,
            output: String::new(),
            duration_ms: 0,
        }
    }

    pub fn failed(gate: Gate, output: impl Into<String>) -> Self {
        Self {
            gate,
            status: GateStatus::Failed,
            output: output.into(),
            duration_ms: 0,
        }
    }

    pub fn skipped(gate: Gate) -> Self {
        Self {
            gate,
            status: GateStatus::Skipped,
            output: String::new(),
            duration_ms: 0,
        }
    }

    /// Skipped gates count as passing
    pub fn is_ok(&self) -> bool {
        self.status != GateStatus::Failed
    }
}

/// Runs quality gates
#[async_trait]
pub trait GateRunner: Send + Sync {
    async fn run(&self, gate: Gate) -> Result<GateResult>;
}

/// Runs gates as `sh -c <command>` in the repository root
#[derive(Debug, Clone)]
pub struct ShellGates {
    workdir: PathBuf,
    commands: GatesConfig,
}

impl ShellGates {
    pub fn new(workdir: impl Into<PathBuf>, commands: GatesConfig) -> Self {
        Self {
            workdir: workdir.into(),
            commands,
        }
    }

    fn command_for(&self, gate: Gate) -> &str {
        match gate {
            Gate::Format => &self.commands.format,
            Gate::Lint => &self.commands.lint,
            Gate::Install => &self.commands.install,
            Gate::Migrate => &self.commands.migrate,
            Gate::UnitTests => &self.commands.unit_tests,
            Gate::E2eTests => &self.commands.e2e_tests,
            Gate::Typecheck => &self.commands.typecheck,
        }
    }
}

#[async_trait]
impl GateRunner for ShellGates {
    async fn run(&self, gate: Gate) -> Result<GateResult> {
        let command = self.command_for(gate).trim();
        if command.is_empty() {
            info!(gate = %gate, "Gate skipped (no command configured)");
            return Ok(GateResult::skipped(gate));
        }

        info!(gate = %gate, command, "Running gate");
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .stdin(Stdio::null());

        let start = Instant::now();
        let output = CommandOutput::capture(&mut cmd)
            .await
            .map_err(|e| Error::Gate(format!("Failed to launch {} gate: {}", gate, e)))?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let status = if output.success {
            GateStatus::Passed
        } else {
            GateStatus::Failed
        };
        debug!(gate = %gate, ?status, code = ?output.code, duration_ms, "Gate finished");

        Ok(GateResult {
            gate,
            status,
            output: output.combined(),
            duration_ms,
        })
    }
}
