//! Output streaming and parsing for Claude Code JSON stream format

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{Error, Result};

/// Length at which tool output is cut for display
const DISPLAY_LIMIT: usize = 200;

/// A message from the Claude Code stream-json output
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// System message at the start
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },

    /// Assistant turn: text and tool calls
    Assistant {
        #[serde(default)]
        message: MessageBody,
    },

    /// Tool results fed back to the model
    User {
        #[serde(default)]
        message: MessageBody,
    },

    /// Final result
    Result(ResultInfo),

    /// Any event type this loop does not display
    #[serde(other)]
    Unknown,
}

/// Content of an assistant or user message
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MessageBody {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// One block of message content
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        /// Either a string or a list of content parts
        #[serde(default)]
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Other,
}

/// Summary emitted when the agent finishes
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResultInfo {
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub num_turns: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
}

/// Handler for processing stream messages
pub trait StreamHandler: Send {
    /// Called when a system message is received
    fn on_system(&mut self, _subtype: Option<&str>, _session_id: Option<&str>) {}

    /// Called when assistant text is received
    fn on_assistant_text(&mut self, text: &str);

    /// Called when the assistant uses a tool
    fn on_tool_use(&mut self, _tool: &str, _input: &serde_json::Value) {}

    /// Called when a tool returns a result
    fn on_tool_result(&mut self, _output: &str, _is_error: bool) {}

    /// Called when the stream completes
    fn on_complete(&mut self, _result: &ResultInfo) {}

    /// Called when a line is not valid stream JSON
    fn on_parse_error(&mut self, _line: &str, _error: &serde_json::Error) {}
}

/// Cut text to at most `limit` bytes on a char boundary
fn clip(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} chars)", &text[..end], text.chars().count())
}

/// Flatten a tool_result content value into display text
fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Prints the agent's narration for a human watching the loop
pub struct PrintHandler {
    /// Whether to show tool calls and results
    verbose: bool,
}

impl PrintHandler {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl StreamHandler for PrintHandler {
    fn on_system(&mut self, subtype: Option<&str>, _session_id: Option<&str>) {
        if self.verbose {
            if let Some(st) = subtype {
                eprintln!("[system: {}]", st);
            }
        }
    }

    fn on_assistant_text(&mut self, text: &str) {
        println!("{}", text);
    }

    fn on_tool_use(&mut self, tool: &str, input: &serde_json::Value) {
        if self.verbose {
            eprintln!("[tool: {} {}]", tool, clip(&input.to_string(), DISPLAY_LIMIT));
        }
    }

    fn on_tool_result(&mut self, output: &str, is_error: bool) {
        if self.verbose {
            let prefix = if is_error { "error" } else { "result" };
            eprintln!("[{}: {}]", prefix, clip(output, DISPLAY_LIMIT));
        }
    }

    fn on_complete(&mut self, result: &ResultInfo) {
        println!();
        if self.verbose {
            if let Some(turns) = result.num_turns {
                eprintln!("[turns: {}]", turns);
            }
            if let Some(cost) = result.total_cost_usd {
                eprintln!("[cost: ${:.4}]", cost);
            }
            if let Some(d) = result.duration_ms {
                eprintln!("[duration: {}ms]", d);
            }
        }
    }

    fn on_parse_error(&mut self, line: &str, error: &serde_json::Error) {
        if self.verbose {
            eprintln!("[unparsed line '{}': {}]", clip(line, DISPLAY_LIMIT), error);
        }
    }
}

/// Stream output from an agent process
pub struct OutputStreamer<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin + Send> OutputStreamer<R> {
    /// Create a new output streamer over a buffered reader
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Stream output, calling the handler for each message
    ///
    /// Returns the final result event, if the agent emitted one, once the
    /// stream ends (process closes stdout).
    pub async fn stream<H: StreamHandler>(&mut self, handler: &mut H) -> Result<Option<ResultInfo>> {
        let mut line = String::new();
        let mut final_result = None;

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await.map_err(Error::Io)?;

            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<StreamMessage>(trimmed) {
                Ok(msg) => {
                    if let Some(result) = Self::dispatch_message(handler, msg) {
                        final_result = Some(result);
                    }
                }
                Err(e) => handler.on_parse_error(trimmed, &e),
            }
        }

        Ok(final_result)
    }

    fn dispatch_message<H: StreamHandler>(handler: &mut H, msg: StreamMessage) -> Option<ResultInfo> {
        match msg {
            StreamMessage::System {
                subtype,
                session_id,
            } => handler.on_system(subtype.as_deref(), session_id.as_deref()),
            StreamMessage::Assistant { message } | StreamMessage::User { message } => {
                for block in message.content {
                    match block {
                        ContentBlock::Text { text } => handler.on_assistant_text(&text),
                        ContentBlock::ToolUse { name, input } => handler.on_tool_use(&name, &input),
                        ContentBlock::ToolResult { content, is_error } => {
                            handler.on_tool_result(&tool_result_text(&content), is_error)
                        }
                        ContentBlock::Other => {}
                    }
                }
            }
            StreamMessage::Result(result) => {
                handler.on_complete(&result);
                return Some(result);
            }
            StreamMessage::Unknown => {}
        }
        None
    }
}
