//! Agent invocation: hand a payload to the agent and wait for it to finish

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::BufReader;
use tracing::{info, warn};

use crate::prompt::PromptPayload;
use crate::Result;

use super::backend::Backend;
use super::output::{OutputStreamer, PrintHandler};

/// What the loop learns from a finished invocation
///
/// Informational only: the cycle ends on completion whatever this says.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentOutcome {
    pub exit_code: Option<i32>,
    pub is_error: bool,
    pub summary: Option<String>,
    pub cost_usd: Option<f64>,
}

/// Dispatches prompts to an external coding agent
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run the agent on a payload, blocking until it exits
    async fn invoke(&self, payload: &PromptPayload) -> Result<AgentOutcome>;
}

/// Spawns a backend process and streams its output to the terminal
pub struct StreamingInvoker {
    backend: Box<dyn Backend>,
    workdir: PathBuf,
    verbose: bool,
}

impl StreamingInvoker {
    pub fn new(backend: Box<dyn Backend>, workdir: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            backend,
            workdir: workdir.into(),
            verbose,
        }
    }
}

#[async_trait]
impl AgentInvoker for StreamingInvoker {
    async fn invoke(&self, payload: &PromptPayload) -> Result<AgentOutcome> {
        let prompt = payload.render();
        info!(
            backend = self.backend.name(),
            prompt_bytes = prompt.len(),
            "Invoking agent"
        );

        let mut handle = self.backend.spawn(&prompt, &self.workdir).await?;
        let stdout = handle.take_stdout()?;

        let mut handler = PrintHandler::new(self.verbose);
        let streamed = OutputStreamer::new(BufReader::new(stdout))
            .stream(&mut handler)
            .await;

        // reap the process even if streaming broke off
        let status = handle.wait().await?;
        let result = streamed?;

        let outcome = AgentOutcome {
            exit_code: status.code(),
            is_error: !status.success() || result.as_ref().is_some_and(|r| r.is_error),
            summary: result.as_ref().and_then(|r| r.result.clone()),
            cost_usd: result.as_ref().and_then(|r| r.total_cost_usd),
        };

        if outcome.is_error {
            warn!(exit_code = ?outcome.exit_code, "Agent finished with an error");
        } else {
            info!(exit_code = ?outcome.exit_code, cost_usd = ?outcome.cost_usd, "Agent finished");
        }

        Ok(outcome)
    }
}

/// Writes payloads to a sink instead of running an agent
pub struct DryRunInvoker<W> {
    sink: std::sync::Mutex<W>,
}

impl DryRunInvoker<std::io::Stdout> {
    /// Print payloads to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> DryRunInvoker<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: std::sync::Mutex::new(sink),
        }
    }

    /// Recover the sink
    pub fn into_inner(self) -> W {
        self.sink.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> AgentInvoker for DryRunInvoker<W> {
    async fn invoke(&self, payload: &PromptPayload) -> Result<AgentOutcome> {
        info!("Dry run: printing payload instead of invoking the agent");
        let mut sink = self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(sink, "----- prompt payload -----")?;
        writeln!(sink, "{}", payload.render())?;
        writeln!(sink, "----- end of payload -----")?;
        sink.flush()?;
        Ok(AgentOutcome::default())
    }
}
