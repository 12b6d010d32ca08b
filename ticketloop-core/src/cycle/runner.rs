//! Inner loop: one pass of preflight then resolution

use tracing::info;

use super::preflight::{GateStep, Preflight};
use super::resolver::DiffBranchResolver;
use super::{CleanupCommit, LoopContext, Remediation};
use crate::Result;

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The agent was dispatched exactly once
    Dispatched(Remediation),
    /// A cleanup commit was made and nothing was dispatched
    Committed(CleanupCommit),
}

pub struct InnerLoop<'a> {
    ctx: &'a LoopContext,
}

impl<'a> InnerLoop<'a> {
    pub fn new(ctx: &'a LoopContext) -> Self {
        Self { ctx }
    }

    /// Run a single cycle
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let outcome = match Preflight::new(self.ctx).run().await? {
            GateStep::Dispatched(remediation) => CycleOutcome::Dispatched(remediation),
            GateStep::Committed(cleanup) => CycleOutcome::Committed(cleanup),
            GateStep::Continue => {
                let remediation = DiffBranchResolver::new(self.ctx).resolve().await?;
                CycleOutcome::Dispatched(remediation)
            }
        };

        info!(outcome = ?outcome, "Cycle finished");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::fakes::{FakeTracker, Harness};
    use crate::gates::Gate;

    #[tokio::test]
    async fn test_full_cycle_dispatches_ticket_work() {
        let mut h = Harness::new();
        h.tracker = FakeTracker::new().with_open(vec![(42, "[PRD-0002-TICKET-001] Add login")]);
        let ctx = h.context();

        let outcome = InnerLoop::new(&ctx).run_once().await.unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Dispatched(Remediation::WorkTicket { number: 42 })
        );
        assert_eq!(
            h.calls(),
            vec![
                "vcs:sync",
                "gate:format",
                "gate:lint",
                "gate:install",
                "gate:migrate",
                "gate:unit-tests",
                "gate:e2e-tests",
                "vcs:staged_diff",
                "gate:typecheck",
                "agent:invoke",
            ]
        );
    }

    #[tokio::test]
    async fn test_gate_failure_never_reaches_resolver() {
        let mut h = Harness::new();
        h.gates.failing.insert(Gate::E2eTests);
        let ctx = h.context();

        let outcome = InnerLoop::new(&ctx).run_once().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Dispatched(Remediation::FixE2eTests));
        assert!(!h.calls().contains(&"vcs:staged_diff".to_string()));
        assert_eq!(h.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_cycle_dispatches_nothing() {
        let mut h = Harness::new();
        h.gates.mutating.insert(Gate::Format);
        let ctx = h.context();

        let outcome = InnerLoop::new(&ctx).run_once().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Committed(CleanupCommit::Format));
        assert_eq!(h.dispatch_count(), 0);
    }
}
