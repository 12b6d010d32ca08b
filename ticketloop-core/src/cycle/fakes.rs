//! In-memory collaborators for exercising the loop without git, GitHub or an agent

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use super::{LoopContext, LoopSettings};
use crate::agent::{AgentInvoker, AgentOutcome};
use crate::backlog::IssueTracker;
use crate::config::GuidanceConfig;
use crate::gates::{Gate, GateResult, GateRunner};
use crate::git::{CommandOutput, Vcs, WorktreeSnapshot};
use crate::guidance::GuidanceLibrary;
use crate::prompt::PromptPayload;
use crate::ticket::{IssueSummary, Ticket, TicketState};
use crate::{Error, Result};

/// Shared ordered log of every collaborator call
pub type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

/// Unstaged paths and a version counter standing in for their contents
pub type Worktree = Arc<Mutex<BTreeMap<String, u64>>>;

#[derive(Clone)]
pub struct FakeVcs {
    pub log: CallLog,
    pub worktree: Worktree,
    pub unpushed: bool,
    pub push_ok: bool,
    pub sync_ok: bool,
    pub commit_ok: bool,
    pub staged_diff: String,
}

impl FakeVcs {
    pub fn new(log: CallLog, worktree: Worktree) -> Self {
        Self {
            log,
            worktree,
            unpushed: false,
            push_ok: true,
            sync_ok: true,
            commit_ok: true,
            staged_diff: String::new(),
        }
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn has_unpushed_commits(&self) -> Result<bool> {
        Ok(self.unpushed)
    }

    async fn push(&self) -> Result<CommandOutput> {
        record(&self.log, "vcs:push");
        Ok(CommandOutput {
            success: self.push_ok,
            code: Some(if self.push_ok { 0 } else { 1 }),
            stdout: String::new(),
            stderr: if self.push_ok {
                String::new()
            } else {
                "! [rejected] main -> main (non-fast-forward)".to_string()
            },
        })
    }

    async fn sync(&self) -> Result<()> {
        record(&self.log, "vcs:sync");
        if self.sync_ok {
            Ok(())
        } else {
            Err(Error::Sync("git pull exited with 1: conflict".to_string()))
        }
    }

    async fn worktree_snapshot(&self) -> Result<WorktreeSnapshot> {
        let mut snapshot = WorktreeSnapshot::new();
        for (path, version) in self.worktree.lock().unwrap().iter() {
            snapshot.insert(path.clone(), version.to_string());
        }
        Ok(snapshot)
    }

    async fn commit_paths(&self, message: &str, paths: &[String]) -> Result<()> {
        record(&self.log, format!("vcs:commit:{} -- {}", message, paths.join(" ")));
        if !self.commit_ok {
            return Err(Error::Commit(
                "git commit exited with 1: husky - pre-commit hook failed".to_string(),
            ));
        }
        let mut worktree = self.worktree.lock().unwrap();
        for path in paths {
            worktree.remove(path);
        }
        Ok(())
    }

    async fn staged_diff(&self) -> Result<String> {
        record(&self.log, "vcs:staged_diff");
        Ok(self.staged_diff.clone())
    }
}

#[derive(Clone)]
pub struct FakeGates {
    pub log: CallLog,
    pub worktree: Worktree,
    pub failing: HashSet<Gate>,
    /// Gates that rewrite `src/<gate>.ts` when run
    pub mutating: HashSet<Gate>,
    /// Gates whose command cannot be launched at all
    pub broken: HashSet<Gate>,
}

impl FakeGates {
    pub fn new(log: CallLog, worktree: Worktree) -> Self {
        Self {
            log,
            worktree,
            failing: HashSet::new(),
            mutating: HashSet::new(),
            broken: HashSet::new(),
        }
    }

    pub fn mutated_path(gate: Gate) -> String {
        format!("src/{}.ts", gate)
    }
}

#[async_trait]
impl GateRunner for FakeGates {
    async fn run(&self, gate: Gate) -> Result<GateResult> {
        record(&self.log, format!("gate:{}", gate));
        if self.broken.contains(&gate) {
            return Err(Error::Gate(format!("Failed to run {} command: sh not found", gate)));
        }
        if self.mutating.contains(&gate) {
            *self
                .worktree
                .lock()
                .unwrap()
                .entry(Self::mutated_path(gate))
                .or_default() += 1;
        }
        Ok(if self.failing.contains(&gate) {
            GateResult::failed(gate, format!("{} failed: 1 error", gate))
        } else {
            GateResult::passed(gate)
        })
    }
}

#[derive(Clone, Default)]
pub struct FakeTracker {
    open: Vec<IssueSummary>,
    closed: Vec<IssueSummary>,
    fail: bool,
    details: Arc<Mutex<Vec<u64>>>,
    limits: Arc<Mutex<Vec<usize>>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker whose every request fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_open(mut self, issues: Vec<(u64, &str)>) -> Self {
        self.open = issues
            .into_iter()
            .map(|(n, t)| IssueSummary::new(n, t, TicketState::Open))
            .collect();
        self
    }

    pub fn with_closed(mut self, issues: Vec<(u64, &str)>) -> Self {
        self.closed = issues
            .into_iter()
            .map(|(n, t)| IssueSummary::new(n, t, TicketState::Closed))
            .collect();
        self
    }

    pub fn detail_requests(&self) -> Vec<u64> {
        self.details.lock().unwrap().clone()
    }

    pub fn limits_seen(&self) -> Vec<usize> {
        self.limits.lock().unwrap().clone()
    }
}

#[async_trait]
impl IssueTracker for FakeTracker {
    async fn list_issues(&self, state: TicketState, limit: usize) -> Result<Vec<IssueSummary>> {
        self.limits.lock().unwrap().push(limit);
        if self.fail {
            return Err(Error::Tracker("HTTP 502 from tracker".to_string()));
        }
        let source = match state {
            TicketState::Open => &self.open,
            TicketState::Closed => &self.closed,
        };
        Ok(source.iter().take(limit).cloned().collect())
    }

    async fn get_ticket(&self, number: u64) -> Result<Ticket> {
        self.details.lock().unwrap().push(number);
        if self.fail {
            return Err(Error::Tracker("HTTP 502 from tracker".to_string()));
        }
        let summary = self
            .open
            .iter()
            .chain(self.closed.iter())
            .find(|i| i.number == number)
            .ok_or_else(|| Error::Tracker(format!("Issue {} not found", number)))?;

        Ok(Ticket {
            number,
            title: summary.title.clone(),
            body: String::new(),
            url: format!("https://github.com/acme/shop/issues/{}", number),
            author: "octocat".to_string(),
            labels: vec![],
            assignees: vec![],
            state: summary.state,
        })
    }
}

#[derive(Clone)]
pub struct FakeAgent {
    pub log: CallLog,
    pub payloads: Arc<Mutex<Vec<String>>>,
    pub fail: bool,
}

impl FakeAgent {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            payloads: Arc::default(),
            fail: false,
        }
    }

    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentInvoker for FakeAgent {
    async fn invoke(&self, payload: &PromptPayload) -> Result<AgentOutcome> {
        record(&self.log, "agent:invoke");
        self.payloads.lock().unwrap().push(payload.render());
        if self.fail {
            return Err(Error::Agent("claude exited before streaming".to_string()));
        }
        Ok(AgentOutcome::default())
    }
}

/// A complete set of fakes sharing one call log
pub struct Harness {
    pub log: CallLog,
    pub vcs: FakeVcs,
    pub gates: FakeGates,
    pub tracker: FakeTracker,
    pub agent: FakeAgent,
    pub guidance_dir: TempDir,
}

impl Harness {
    /// All gates pass, nothing staged, empty tracker, roadmap present
    pub fn new() -> Self {
        let log = CallLog::default();
        let worktree = Worktree::default();
        let guidance_dir = tempfile::tempdir().unwrap();

        let paths = GuidanceConfig::default();
        let roadmap = guidance_dir.path().join(&paths.roadmap);
        std::fs::create_dir_all(roadmap.parent().unwrap()).unwrap();
        std::fs::write(&roadmap, "1. Accounts\n2. Checkout\n").unwrap();

        Self {
            vcs: FakeVcs::new(log.clone(), worktree.clone()),
            gates: FakeGates::new(log.clone(), worktree),
            tracker: FakeTracker::new(),
            agent: FakeAgent::new(log.clone()),
            log,
            guidance_dir,
        }
    }

    pub fn context(&self) -> LoopContext {
        LoopContext {
            vcs: Box::new(self.vcs.clone()),
            tracker: Box::new(self.tracker.clone()),
            agent: Box::new(self.agent.clone()),
            gates: Box::new(self.gates.clone()),
            guidance: GuidanceLibrary::new(self.guidance_dir.path(), GuidanceConfig::default()),
            settings: LoopSettings::default(),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.calls().iter().filter(|c| *c == "agent:invoke").count()
    }

    pub fn ran_gate(&self, gate: Gate) -> bool {
        self.calls().contains(&format!("gate:{}", gate))
    }
}
