//! Outer loop controller

use std::fmt;
use std::time::Duration;

use tracing::{error, info, warn};

use super::runner::{CycleOutcome, InnerLoop};
use super::LoopContext;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Running,
    Stopped,
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopStatus::Running => write!(f, "running"),
            LoopStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Iteration counter; a maximum of 0 means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    iteration: u64,
    max_iterations: u64,
}

impl LoopState {
    pub fn new(max_iterations: u64) -> Self {
        Self {
            iteration: 0,
            max_iterations,
        }
    }

    /// Iterations started so far
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_iterations == 0
    }

    pub fn status(&self) -> LoopStatus {
        if !self.is_unlimited() && self.iteration >= self.max_iterations {
            LoopStatus::Stopped
        } else {
            LoopStatus::Running
        }
    }

    /// Start the next iteration and return its 1-based number
    pub fn begin_iteration(&mut self) -> u64 {
        self.iteration += 1;
        self.iteration
    }
}

/// Tally of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub iterations: u64,
    pub dispatched: u64,
    pub cleanups: u64,
    /// Cycles that ended on a non-fatal error
    pub failed_cycles: u64,
}

/// Runs cycles back to back until the iteration limit
pub struct OuterLoop<'a> {
    ctx: &'a LoopContext,
    state: LoopState,
    delay: Duration,
}

impl<'a> OuterLoop<'a> {
    pub fn new(ctx: &'a LoopContext, max_iterations: u64, delay: Duration) -> Self {
        Self {
            ctx,
            state: LoopState::new(max_iterations),
            delay,
        }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Run until stopped
    ///
    /// Non-fatal cycle errors are logged and the next cycle starts from the
    /// top. A fatal error ends the run.
    pub async fn run(&mut self) -> Result<LoopSummary> {
        let mut summary = LoopSummary::default();
        info!(
            max_iterations = self.state.max_iterations(),
            unlimited = self.state.is_unlimited(),
            "Starting loop"
        );

        while self.state.status() == LoopStatus::Running {
            if self.state.iteration() > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let iteration = self.state.begin_iteration();
            info!(iteration, "Starting cycle");
            summary.iterations = iteration;

            match InnerLoop::new(self.ctx).run_once().await {
                Ok(CycleOutcome::Dispatched(_)) => summary.dispatched += 1,
                Ok(CycleOutcome::Committed(_)) => summary.cleanups += 1,
                Err(e) if e.is_fatal() => {
                    error!(iteration, error = %e, "Fatal error, stopping loop");
                    return Err(e);
                }
                Err(e) => {
                    warn!(iteration, error = %e, "Cycle failed, moving on");
                    summary.failed_cycles += 1;
                }
            }
        }

        info!(?summary, status = %self.state.status(), "Loop finished");
        Ok(summary)
    }
}
