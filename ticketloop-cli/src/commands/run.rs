//! Run command - the outer loop

use clap::Args;
use ticketloop_core::OuterLoop;

use crate::workspace::Workspace;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of iterations; 0 runs until interrupted
    #[arg(default_value = "0")]
    pub max_iterations: u64,

    /// Print prompts instead of invoking the agent
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub async fn execute(&self, workspace: &Workspace, verbose: bool) -> anyhow::Result<()> {
        let ctx = workspace.loop_context(self.dry_run, verbose)?;
        let delay = workspace.config().loop_.iteration_delay;

        tracing::info!(
            root = %workspace.root().display(),
            max_iterations = self.max_iterations,
            dry_run = self.dry_run,
            "Starting ticketloop run"
        );

        let summary = OuterLoop::new(&ctx, self.max_iterations, delay).run().await?;

        println!();
        println!("Iterations: {}", summary.iterations);
        println!("  dispatched:    {}", summary.dispatched);
        println!("  cleanups:      {}", summary.cleanups);
        println!("  failed cycles: {}", summary.failed_cycles);

        Ok(())
    }
}
