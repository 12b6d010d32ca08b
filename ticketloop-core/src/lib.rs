//! Ticketloop Core - Core library for the autonomous ticket loop
//!
//! This crate provides the pieces of the loop that keeps a repository moving
//! through its ticket backlog: quality gates, backlog ordering, prompt
//! composition and dispatch to an external coding agent.

pub mod agent;
pub mod backlog;
pub mod config;
pub mod cycle;
pub mod error;
pub mod gates;
pub mod git;
pub mod guidance;
pub mod prompt;
pub mod secrets;
pub mod ticket;

pub use agent::{
    AgentHandle, AgentInvoker, AgentOutcome, Backend, ClaudeBackend, DryRunInvoker,
    OutputStreamer, PrintHandler, StreamHandler, StreamingInvoker,
};
pub use backlog::{Backlog, IssueTracker, Selection};
pub use config::Config;
pub use cycle::{
    CleanupCommit, CycleOutcome, DiffBranchResolver, GateStep, InnerLoop, LoopContext,
    LoopSettings, LoopState, LoopStatus, LoopSummary, OuterLoop, Preflight, Remediation,
};
pub use error::{Error, Result};
pub use gates::{Gate, GateResult, GateRunner, GateStatus, ShellGates};
pub use git::{CommandOutput, GitRepo, Vcs, WorktreeSnapshot};
pub use guidance::{Document, GuidanceDoc, GuidanceLibrary};
pub use prompt::{compose, PromptPayload, Segment};
pub use secrets::Secrets;
pub use ticket::{IssueSummary, Ticket, TicketState, TicketTag};
