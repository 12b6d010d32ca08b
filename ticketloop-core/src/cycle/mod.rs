//! The autonomous loop
//!
//! One cycle runs the preflight gates in a fixed order and, if they all
//! pass, inspects the staging area to decide what the agent should do next.
//! Every cycle ends after at most one dispatch to the agent (or one cleanup
//! commit); the outer loop then starts the next cycle from the top.

mod controller;
mod preflight;
mod resolver;
mod runner;

#[cfg(test)]
pub(crate) mod fakes;

pub use controller::{LoopState, LoopStatus, LoopSummary, OuterLoop};
pub use preflight::{GateStep, Preflight};
pub use resolver::DiffBranchResolver;
pub use runner::{CycleOutcome, InnerLoop};

use std::fmt;

use tracing::{debug, info, warn};

use crate::agent::AgentInvoker;
use crate::backlog::IssueTracker;
use crate::config::{Config, PromptConfig};
use crate::gates::GateRunner;
use crate::git::Vcs;
use crate::guidance::GuidanceLibrary;
use crate::prompt::PromptPayload;

/// Why the agent was dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remediation {
    /// Local commits could not be pushed
    PushConflict,
    FixUnitTests,
    FixE2eTests,
    FixTypecheck,
    /// Start the selected ticket
    WorkTicket { number: u64 },
    /// No open tickets: plan the next PRD
    PlanNextPrd {
        most_recent_completed_prd: Option<String>,
    },
    /// Finish staged work on a known ticket
    ContinueTicket { number: u64 },
    /// Finish staged work the loop could not match to a ticket
    ContinueUnmatched,
}

impl fmt::Display for Remediation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remediation::PushConflict => write!(f, "resolve push conflict"),
            Remediation::FixUnitTests => write!(f, "fix unit tests"),
            Remediation::FixE2eTests => write!(f, "fix e2e tests"),
            Remediation::FixTypecheck => write!(f, "fix type errors"),
            Remediation::WorkTicket { number } => write!(f, "work ticket #{}", number),
            Remediation::PlanNextPrd { .. } => write!(f, "plan next PRD"),
            Remediation::ContinueTicket { number } => write!(f, "continue ticket #{}", number),
            Remediation::ContinueUnmatched => write!(f, "continue unmatched work"),
        }
    }
}

/// A formatting-only or lint-only commit made by the loop itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupCommit {
    Format,
    Lint,
}

impl fmt::Display for CleanupCommit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupCommit::Format => write!(f, "formatting"),
            CleanupCommit::Lint => write!(f, "lint fixes"),
        }
    }
}

/// Tunables the cycle reads
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub remote: String,
    pub issue_limit: usize,
    pub prompt: PromptConfig,
    pub format_commit_message: String,
    pub lint_commit_message: String,
}

impl LoopSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote: config.git.remote.clone(),
            issue_limit: config.tracker.issue_limit,
            prompt: config.prompt,
            format_commit_message: config.git.format_commit_message.clone(),
            lint_commit_message: config.git.lint_commit_message.clone(),
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything a cycle talks to, built once per process
pub struct LoopContext {
    pub vcs: Box<dyn Vcs>,
    pub tracker: Box<dyn IssueTracker>,
    pub agent: Box<dyn AgentInvoker>,
    pub gates: Box<dyn GateRunner>,
    pub guidance: GuidanceLibrary,
    pub settings: LoopSettings,
}

impl LoopContext {
    /// Hand one payload to the agent and wait for it
    ///
    /// The agent's own success or failure is logged, never acted on.
    pub(crate) async fn dispatch(
        &self,
        remediation: Remediation,
        payload: PromptPayload,
    ) -> Remediation {
        info!(remediation = %remediation, "Dispatching to agent");

        match self.agent.invoke(&payload).await {
            Ok(outcome) => debug!(?outcome, "Agent invocation finished"),
            Err(e) => warn!(error = %e, remediation = %remediation, "Agent invocation failed"),
        }

        remediation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(CleanupCommit::Format.to_string(), "formatting");
        assert_eq!(CleanupCommit::Lint.to_string(), "lint fixes");
        assert_eq!(
            Remediation::WorkTicket { number: 42 }.to_string(),
            "work ticket #42"
        );
    }
}
