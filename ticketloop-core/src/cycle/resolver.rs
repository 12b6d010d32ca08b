//! Diff branch resolver
//!
//! Runs once every preflight gate has passed and picks the single dispatch
//! for the cycle from the state of the staging area.

use tracing::{info, warn};

use super::{LoopContext, Remediation};
use crate::backlog::{Backlog, Selection};
use crate::gates::Gate;
use crate::guidance::GuidanceDoc;
use crate::prompt::{self, PromptPayload};
use crate::Result;

pub struct DiffBranchResolver<'a> {
    ctx: &'a LoopContext,
}

impl<'a> DiffBranchResolver<'a> {
    pub fn new(ctx: &'a LoopContext) -> Self {
        Self { ctx }
    }

    /// Dispatch the agent exactly once
    ///
    /// An error means nothing was dispatched. On a clean staging area a
    /// tracker failure is such an error, and it is fatal: without the
    /// backlog there is no way to tell ticket work from PRD planning.
    pub async fn resolve(&self) -> Result<Remediation> {
        let diff = self.ctx.vcs.staged_diff().await?;

        let (remediation, payload) = if diff.trim().is_empty() {
            info!("Staging area is clean");
            self.clean_branch().await?
        } else {
            info!(diff_bytes = diff.len(), "Staging area holds work in progress");
            self.dirty_branch(&diff).await
        };

        Ok(self.ctx.dispatch(remediation, payload).await)
    }

    fn backlog(&self) -> Backlog<'_> {
        Backlog::new(self.ctx.tracker.as_ref(), self.ctx.settings.issue_limit)
    }

    async fn clean_branch(&self) -> Result<(Remediation, PromptPayload)> {
        let check = self.ctx.gates.run(Gate::Typecheck).await?;
        if !check.is_ok() {
            warn!("Type check failed");
            let payload =
                prompt::fix_typecheck(&check.output, self.ctx.settings.prompt.max_output_bytes);
            return Ok((Remediation::FixTypecheck, payload));
        }

        match self.backlog().select_next().await? {
            Selection::Ticket(ticket) => {
                info!(ticket = ticket.number, title = %ticket.title, "Selected ticket");
                let process = self.ctx.guidance.load(GuidanceDoc::ImplementationProcess)?;
                Ok((
                    Remediation::WorkTicket {
                        number: ticket.number,
                    },
                    prompt::work_ticket(&ticket, process),
                ))
            }
            Selection::NoTicket {
                most_recent_completed_prd,
            } => {
                info!(most_recent_prd = ?most_recent_completed_prd, "Backlog empty, planning next PRD");
                let guidance = &self.ctx.guidance;
                let payload = prompt::plan_next_prd(
                    most_recent_completed_prd.as_deref(),
                    guidance.load(GuidanceDoc::Roadmap)?,
                    guidance.load(GuidanceDoc::PrdTemplate)?,
                    guidance.load(GuidanceDoc::ErdTemplate)?,
                    guidance.load(GuidanceDoc::TicketTemplate)?,
                );
                Ok((
                    Remediation::PlanNextPrd {
                        most_recent_completed_prd,
                    },
                    payload,
                ))
            }
        }
    }

    /// Never fails: a tracker problem falls back to the unmatched prompt
    async fn dirty_branch(&self, diff: &str) -> (Remediation, PromptPayload) {
        let max_diff = self.ctx.settings.prompt.max_diff_bytes;

        match self.backlog().select_next().await {
            Ok(Selection::Ticket(ticket)) => {
                info!(ticket = ticket.number, "Continuing ticket");
                (
                    Remediation::ContinueTicket {
                        number: ticket.number,
                    },
                    prompt::continue_ticket(&ticket, diff, max_diff),
                )
            }
            Ok(Selection::NoTicket { .. }) => {
                info!("No open ticket matches the staged work");
                (
                    Remediation::ContinueUnmatched,
                    prompt::continue_unmatched(diff, max_diff),
                )
            }
            Err(e) => {
                warn!(error = %e, "Backlog lookup failed, using generic continue prompt");
                (
                    Remediation::ContinueUnmatched,
                    prompt::continue_unmatched(diff, max_diff),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;
    use crate::cycle::fakes::{FakeTracker, Harness};
    use crate::Error;

    fn ticket_refs(prompt: &str) -> Vec<String> {
        Regex::new(r"#\d+")
            .unwrap()
            .find_iter(prompt)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_clean_branch_works_top_ticket() {
        let mut h = Harness::new();
        h.tracker = FakeTracker::new().with_open(vec![(42, "[PRD-0002-TICKET-001] Add login")]);
        let ctx = h.context();

        let remediation = DiffBranchResolver::new(&ctx).resolve().await.unwrap();
        assert_eq!(remediation, Remediation::WorkTicket { number: 42 });
        assert_eq!(h.dispatch_count(), 1);
        assert!(h.ran_gate(Gate::Typecheck));

        let payloads = h.agent.payloads();
        assert_eq!(ticket_refs(&payloads[0]), vec!["#42"]);
        assert!(payloads[0].contains("ref [prompts/implementation-process.md]"));
    }

    #[tokio::test]
    async fn test_clean_branch_picks_lowest_tag() {
        let mut h = Harness::new();
        h.tracker = FakeTracker::new().with_open(vec![
            (7, "Untagged chore"),
            (12, "[PRD-0001-TICKET-002] Session store"),
            (11, "[PRD-0001-TICKET-001] User table"),
        ]);
        let ctx = h.context();

        let remediation = DiffBranchResolver::new(&ctx).resolve().await.unwrap();
        assert_eq!(remediation, Remediation::WorkTicket { number: 11 });
        assert_eq!(h.tracker.detail_requests(), vec![11]);
    }

    #[tokio::test]
    async fn test_clean_branch_plans_next_prd() {
        let mut h = Harness::new();
        h.tracker = FakeTracker::new().with_closed(vec![
            (1, "[PRD-0001-TICKET-001] Accounts"),
            (5, "[PRD-0003-TICKET-004] Checkout"),
            (3, "Untagged"),
        ]);
        let ctx = h.context();

        let remediation = DiffBranchResolver::new(&ctx).resolve().await.unwrap();
        assert_eq!(
            remediation,
            Remediation::PlanNextPrd {
                most_recent_completed_prd: Some("0003".to_string())
            }
        );

        let payloads = h.agent.payloads();
        assert!(payloads[0].contains("PRD-0003"));
        assert!(payloads[0].contains("ref [docs/ROADMAP.md]\n1. Accounts"));
        assert!(payloads[0].contains("ref [prompts/prd-template.md]"));
    }

    #[tokio::test]
    async fn test_clean_branch_type_errors_dispatch_fix() {
        let mut h = Harness::new();
        h.gates.failing.insert(Gate::Typecheck);
        let ctx = h.context();

        let remediation = DiffBranchResolver::new(&ctx).resolve().await.unwrap();
        assert_eq!(remediation, Remediation::FixTypecheck);
        assert_eq!(h.dispatch_count(), 1);
        assert!(h.tracker.limits_seen().is_empty());
    }

    #[tokio::test]
    async fn test_clean_branch_tracker_error_is_fatal() {
        let mut h = Harness::new();
        h.tracker = FakeTracker::failing();
        let ctx = h.context();

        let err = DiffBranchResolver::new(&ctx).resolve().await.unwrap_err();
        assert!(matches!(err, Error::Tracker(_)));
        assert!(err.is_fatal());
        assert_eq!(h.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_clean_branch_missing_roadmap_is_fatal() {
        let h = Harness::new();
        std::fs::remove_file(h.guidance_dir.path().join("docs/ROADMAP.md")).unwrap();
        let ctx = h.context();

        let err = DiffBranchResolver::new(&ctx).resolve().await.unwrap_err();
        assert!(matches!(err, Error::Guidance(_)));
        assert!(err.is_fatal());
        assert_eq!(h.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_dirty_branch_continues_matched_ticket() {
        let mut h = Harness::new();
        h.vcs.staged_diff = "diff --git a/src/login.ts b/src/login.ts\n+export {}\n".to_string();
        h.tracker = FakeTracker::new().with_open(vec![(42, "[PRD-0002-TICKET-001] Add login")]);
        let ctx = h.context();

        let remediation = DiffBranchResolver::new(&ctx).resolve().await.unwrap();
        assert_eq!(remediation, Remediation::ContinueTicket { number: 42 });
        assert!(!h.ran_gate(Gate::Typecheck));

        let payloads = h.agent.payloads();
        assert_eq!(ticket_refs(&payloads[0]), vec!["#42"]);
        assert!(payloads[0].contains("+export {}"));
    }

    #[tokio::test]
    async fn test_dirty_branch_tracker_failure_still_dispatches_once() {
        let mut h = Harness::new();
        h.vcs.staged_diff = "diff --git a/x b/x\n+1\n".to_string();
        h.tracker = FakeTracker::failing();
        let ctx = h.context();

        let remediation = DiffBranchResolver::new(&ctx).resolve().await.unwrap();
        assert_eq!(remediation, Remediation::ContinueUnmatched);
        assert_eq!(h.dispatch_count(), 1);
        assert!(h.agent.payloads()[0].contains("+1"));
    }

    #[tokio::test]
    async fn test_dirty_branch_without_open_tickets_uses_fallback() {
        let mut h = Harness::new();
        h.vcs.staged_diff = "diff --git a/x b/x\n+1\n".to_string();
        let ctx = h.context();

        let remediation = DiffBranchResolver::new(&ctx).resolve().await.unwrap();
        assert_eq!(remediation, Remediation::ContinueUnmatched);
        assert_eq!(h.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_agent_failure_still_counts_as_dispatch() {
        let mut h = Harness::new();
        h.agent.fail = true;
        h.tracker = FakeTracker::new().with_open(vec![(42, "[PRD-0002-TICKET-001] Add login")]);
        let ctx = h.context();

        let remediation = DiffBranchResolver::new(&ctx).resolve().await.unwrap();
        assert_eq!(remediation, Remediation::WorkTicket { number: 42 });
        assert_eq!(h.dispatch_count(), 1);
    }
}
