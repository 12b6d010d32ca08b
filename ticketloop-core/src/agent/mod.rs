//! Agent module for dispatching prompts to an external coding agent

mod backend;
mod invoker;
mod output;
mod spawn;

pub use backend::{Backend, ClaudeBackend};
pub use invoker::{AgentInvoker, AgentOutcome, DryRunInvoker, StreamingInvoker};
pub use output::{ContentBlock, OutputStreamer, PrintHandler, ResultInfo, StreamHandler, StreamMessage};
pub use spawn::AgentHandle;
