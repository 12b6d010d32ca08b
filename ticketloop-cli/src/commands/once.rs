//! Once command - a single cycle

use clap::Args;
use ticketloop_core::{CycleOutcome, InnerLoop};

use crate::workspace::Workspace;

/// Arguments for the once command
#[derive(Args, Debug)]
pub struct OnceArgs {
    /// Print the prompt instead of invoking the agent
    #[arg(long)]
    pub dry_run: bool,
}

impl OnceArgs {
    pub async fn execute(&self, workspace: &Workspace, verbose: bool) -> anyhow::Result<()> {
        let ctx = workspace.loop_context(self.dry_run, verbose)?;

        match InnerLoop::new(&ctx).run_once().await? {
            CycleOutcome::Dispatched(remediation) => println!("Dispatched: {}", remediation),
            CycleOutcome::Committed(cleanup) => println!("Committed {} cleanup", cleanup),
        }

        Ok(())
    }
}
