//! Preflight gate sequence
//!
//! Gates run in a fixed order and the first one that needs the agent ends
//! the cycle:
//!
//! 1. push pending commits (failure: push-conflict dispatch)
//! 2. fetch and pull (failure aborts the run)
//! 3. auto-format; the files it rewrote are committed and pushed on their own
//! 4. lint auto-fix, same as format
//! 5. install dependencies and apply migrations
//! 6. unit tests (failure: fix-unit-tests dispatch)
//! 7. end-to-end tests (failure: fix-e2e-tests dispatch)

use tracing::{debug, info, warn};

use super::{CleanupCommit, LoopContext, Remediation};
use crate::gates::Gate;
use crate::guidance::{Document, GuidanceDoc};
use crate::prompt::{self, PromptPayload};
use crate::Result;

type FailurePrompt = fn(Document, &str, usize) -> PromptPayload;

/// Where the preflight sequence stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateStep {
    /// Every gate passed; inspect the staging area next
    Continue,
    /// A gate failed and the agent was dispatched to fix it
    Dispatched(Remediation),
    /// The loop committed a formatting or lint cleanup itself
    Committed(CleanupCommit),
}

pub struct Preflight<'a> {
    ctx: &'a LoopContext,
}

impl<'a> Preflight<'a> {
    pub fn new(ctx: &'a LoopContext) -> Self {
        Self { ctx }
    }

    pub async fn run(&self) -> Result<GateStep> {
        if let Some(step) = self.push_pending().await? {
            return Ok(step);
        }

        info!("Syncing with remote");
        self.ctx.vcs.sync().await?;

        for (gate, cleanup) in [
            (Gate::Format, CleanupCommit::Format),
            (Gate::Lint, CleanupCommit::Lint),
        ] {
            if self.auto_fix(gate, cleanup).await? {
                return Ok(GateStep::Committed(cleanup));
            }
        }

        for gate in [Gate::Install, Gate::Migrate] {
            let result = self.ctx.gates.run(gate).await?;
            if !result.is_ok() {
                warn!(gate = %gate, "Environment bring-up failed, continuing");
            }
        }

        let test_gates: [(Gate, Remediation, GuidanceDoc, FailurePrompt); 2] = [
            (
                Gate::UnitTests,
                Remediation::FixUnitTests,
                GuidanceDoc::FixUnitTests,
                prompt::fix_unit_tests,
            ),
            (
                Gate::E2eTests,
                Remediation::FixE2eTests,
                GuidanceDoc::FixE2eTests,
                prompt::fix_e2e_tests,
            ),
        ];
        for (gate, remediation, doc, build) in test_gates {
            if let Some(step) = self.test_gate(gate, remediation, doc, build).await? {
                return Ok(step);
            }
        }

        debug!("All preflight gates passed");
        Ok(GateStep::Continue)
    }

    async fn push_pending(&self) -> Result<Option<GateStep>> {
        if !self.ctx.vcs.has_unpushed_commits().await? {
            return Ok(None);
        }

        info!("Pushing pending commits");
        let output = self.ctx.vcs.push().await?;
        if output.success {
            return Ok(None);
        }

        warn!(code = ?output.code, "Push rejected");
        let settings = &self.ctx.settings;
        let payload = prompt::push_conflict(
            &settings.remote,
            &output.combined(),
            settings.prompt.max_output_bytes,
        );
        let remediation = self.ctx.dispatch(Remediation::PushConflict, payload).await;
        Ok(Some(GateStep::Dispatched(remediation)))
    }

    /// Run a self-fixing gate; true if it changed the working tree and the
    /// change was committed
    ///
    /// Only the paths the gate rewrote go into the commit. A refused commit
    /// is logged and the remaining gates still run.
    async fn auto_fix(&self, gate: Gate, cleanup: CleanupCommit) -> Result<bool> {
        let before = self.ctx.vcs.worktree_snapshot().await?;
        let result = self.ctx.gates.run(gate).await?;
        if !result.is_ok() {
            // leftovers surface in the test gates or the agent's own checks
            warn!(gate = %gate, "Gate reported problems it could not fix");
        }

        let after = self.ctx.vcs.worktree_snapshot().await?;
        let changed = after.changed_since(&before);
        if changed.is_empty() {
            debug!(gate = %gate, "No changes");
            return Ok(false);
        }

        let message = match cleanup {
            CleanupCommit::Format => &self.ctx.settings.format_commit_message,
            CleanupCommit::Lint => &self.ctx.settings.lint_commit_message,
        };
        info!(gate = %gate, message = %message, paths = ?changed, "Committing cleanup");
        match self.ctx.vcs.commit_paths(message, &changed).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(gate = %gate, error = %e, "Cleanup commit refused, continuing");
                return Ok(false);
            }
        }

        let output = self.ctx.vcs.push().await?;
        if !output.success {
            warn!(gate = %gate, "Cleanup push failed; next cycle will retry it");
        }
        Ok(true)
    }

    async fn test_gate(
        &self,
        gate: Gate,
        remediation: Remediation,
        doc: GuidanceDoc,
        build: FailurePrompt,
    ) -> Result<Option<GateStep>> {
        let result = self.ctx.gates.run(gate).await?;
        if result.is_ok() {
            debug!(gate = %gate, status = ?result.status, "Gate passed");
            return Ok(None);
        }

        warn!(gate = %gate, duration_ms = result.duration_ms, "Gate failed");
        let guidance = self.ctx.guidance.load(doc)?;
        let payload = build(guidance, &result.output, self.ctx.settings.prompt.max_output_bytes);

        let remediation = self.ctx.dispatch(remediation, payload).await;
        Ok(Some(GateStep::Dispatched(remediation)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::process::Command;

    use git2::Repository;

    use super::*;
    use crate::config::GatesConfig;
    use crate::cycle::fakes::{FakeGates, Harness};
    use crate::gates::ShellGates;
    use crate::git::{GitRepo, Vcs};
    use crate::Error;

    fn git(dir: &Path, args: &[&str]) {
        let output = Command::new("git").args(args).current_dir(dir).output().unwrap();
        assert!(
            output.status.success(),
            "git {:?}: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// A clone with one pushed commit of `style.ts` and its bare origin
    fn clone_with_origin() -> (tempfile::TempDir, tempfile::TempDir) {
        let origin = tempfile::tempdir().unwrap();
        git(origin.path(), &["init", "--bare"]);

        let work = tempfile::tempdir().unwrap();
        let dir = work.path();
        git(dir, &["init"]);
        git(dir, &["config", "user.name", "Loop Test"]);
        git(dir, &["config", "user.email", "loop@example.com"]);
        std::fs::write(dir.join("style.ts"), "const a=1\n").unwrap();
        git(dir, &["add", "style.ts"]);
        git(dir, &["commit", "-m", "init"]);
        let url = origin.path().to_string_lossy().into_owned();
        git(dir, &["remote", "add", "origin", &url]);
        git(dir, &["push", "-u", "origin", "HEAD"]);
        (work, origin)
    }

    fn only_format(command: &str) -> GatesConfig {
        GatesConfig {
            format: command.to_string(),
            lint: String::new(),
            install: String::new(),
            migrate: String::new(),
            unit_tests: String::new(),
            e2e_tests: String::new(),
            typecheck: String::new(),
        }
    }

    #[tokio::test]
    async fn test_all_gates_pass() {
        let h = Harness::new();
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Continue);
        assert_eq!(h.dispatch_count(), 0);
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
            ]
        );
    }

    #[tokio::test]
    async fn test_unit_test_failure_dispatches_once_and_skips_e2e() {
        let mut h = Harness::new();
        h.gates.failing.insert(Gate::UnitTests);
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Dispatched(Remediation::FixUnitTests));
        assert_eq!(h.dispatch_count(), 1);
        assert!(!h.ran_gate(Gate::E2eTests));

        let payloads = h.agent.payloads();
        assert!(payloads[0].contains("ref [prompts/fix-unit-tests.md]"));
        assert!(payloads[0].contains("unit-tests failed: 1 error"));
    }

    #[tokio::test]
    async fn test_e2e_failure_dispatches_fix_e2e() {
        let mut h = Harness::new();
        h.gates.failing.insert(Gate::E2eTests);
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Dispatched(Remediation::FixE2eTests));
        assert_eq!(h.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn test_push_failure_dispatches_conflict_and_stops() {
        let mut h = Harness::new();
        h.vcs.unpushed = true;
        h.vcs.push_ok = false;
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Dispatched(Remediation::PushConflict));
        assert_eq!(h.calls(), vec!["vcs:push", "agent:invoke"]);
        assert!(h.agent.payloads()[0].contains("non-fast-forward"));
    }

    #[tokio::test]
    async fn test_pending_commits_pushed_then_gates_continue() {
        let mut h = Harness::new();
        h.vcs.unpushed = true;
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Continue);
        assert_eq!(&h.calls()[..2], ["vcs:push", "vcs:sync"]);
    }

    #[tokio::test]
    async fn test_sync_failure_is_fatal() {
        let mut h = Harness::new();
        h.vcs.sync_ok = false;
        let ctx = h.context();

        let err = Preflight::new(&ctx).run().await.unwrap_err();
        assert!(matches!(err, Error::Sync(_)));
        assert!(err.is_fatal());
        assert_eq!(h.dispatch_count(), 0);
        assert!(!h.ran_gate(Gate::Format));
    }

    #[tokio::test]
    async fn test_format_mutation_commits_and_stops() {
        let mut h = Harness::new();
        h.gates.mutating.insert(Gate::Format);
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Committed(CleanupCommit::Format));
        assert_eq!(h.dispatch_count(), 0);
        assert!(!h.ran_gate(Gate::Lint));

        let calls = h.calls();
        let commit = format!(
            "vcs:commit:{} -- {}",
            ctx.settings.format_commit_message,
            FakeGates::mutated_path(Gate::Format)
        );
        assert_eq!(&calls[calls.len() - 2..], [commit.as_str(), "vcs:push"]);
    }

    #[tokio::test]
    async fn test_lint_mutation_commits_with_lint_message() {
        let mut h = Harness::new();
        h.gates.mutating.insert(Gate::Lint);
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Committed(CleanupCommit::Lint));
        let commit = format!(
            "vcs:commit:{} -- {}",
            ctx.settings.lint_commit_message,
            FakeGates::mutated_path(Gate::Lint)
        );
        assert!(h.calls().contains(&commit));
        assert!(!h.ran_gate(Gate::Install));
    }

    #[tokio::test]
    async fn test_failing_format_without_changes_continues() {
        let mut h = Harness::new();
        h.gates.failing.insert(Gate::Format);
        h.gates.failing.insert(Gate::Install);
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Continue);
        assert!(h.ran_gate(Gate::E2eTests));
    }

    #[tokio::test]
    async fn test_format_commit_only_includes_rewritten_files() {
        let mut h = Harness::new();
        h.vcs
            .worktree
            .lock()
            .unwrap()
            .insert("src/draft.ts".to_string(), 7);
        h.gates.mutating.insert(Gate::Format);
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Committed(CleanupCommit::Format));

        let commit = h
            .calls()
            .into_iter()
            .find(|c| c.starts_with("vcs:commit:"))
            .unwrap();
        assert!(commit.ends_with(" -- src/format.ts"));
        assert!(h.vcs.worktree.lock().unwrap().contains_key("src/draft.ts"));
    }

    #[tokio::test]
    async fn test_refused_cleanup_commit_continues_with_gates() {
        let mut h = Harness::new();
        h.vcs.commit_ok = false;
        h.gates.mutating.insert(Gate::Format);
        let ctx = h.context();

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Continue);
        assert!(h.ran_gate(Gate::Lint));
        assert!(h.ran_gate(Gate::E2eTests));
        assert!(!h.calls().contains(&"vcs:push".to_string()));
        assert_eq!(h.dispatch_count(), 0);
    }

    #[tokio::test]
    async fn test_format_cleanup_keeps_staged_ticket_work_out_of_commit() {
        let (work, origin) = clone_with_origin();
        let dir = work.path();
        std::fs::write(dir.join("feature.ts"), "export const login = 1;\n").unwrap();
        git(dir, &["add", "feature.ts"]);

        let h = Harness::new();
        let repo = GitRepo::open(dir, "origin").unwrap();
        let mut ctx = h.context();
        ctx.vcs = Box::new(repo.clone());
        ctx.gates = Box::new(ShellGates::new(dir, only_format("echo 'const a = 1;' > style.ts")));

        let step = Preflight::new(&ctx).run().await.unwrap();
        assert_eq!(step, GateStep::Committed(CleanupCommit::Format));

        let local = Repository::open(dir).unwrap();
        let head = local.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.summary(), Some(ctx.settings.format_commit_message.as_str()));
        assert!(head.tree().unwrap().get_name("feature.ts").is_none());

        let staged = repo.staged_diff().await.unwrap();
        assert!(staged.contains("+export const login = 1;"));

        let branch = local.head().unwrap().shorthand().unwrap().to_string();
        let remote = Repository::open_bare(origin.path()).unwrap();
        let pushed = remote
            .find_branch(&branch, git2::BranchType::Local)
            .unwrap()
            .get()
            .peel_to_commit()
            .unwrap();
        assert_eq!(pushed.id(), head.id());
        let pushed_tree = pushed.tree().unwrap();
        assert!(pushed_tree.get_name("feature.ts").is_none());
        assert!(pushed_tree.get_name("style.ts").is_some());
    }
}
