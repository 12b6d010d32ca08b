//! Prompt composition
//!
//! A prompt is an ordered list of segments. Literal segments are emitted as
//! is; document segments are emitted as a `ref [label]` line followed by the
//! document's full text. Composition is a pure function of its inputs.

mod templates;

pub use templates::{
    continue_ticket, continue_unmatched, fix_e2e_tests, fix_typecheck, fix_unit_tests,
    plan_next_prd, push_conflict, work_ticket,
};

use crate::guidance::Document;

/// Separator placed between two segments
const SEGMENT_SEPARATOR: &str = "\n\n";

/// One piece of a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text
    Text(String),
    /// A guidance document included in full
    Document { label: String, contents: String },
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(text.into())
    }

    fn render(&self) -> String {
        match self {
            Segment::Text(text) => text.clone(),
            Segment::Document { label, contents } => format!("ref [{}]\n{}", label, contents),
        }
    }
}

impl From<Document> for Segment {
    fn from(doc: Document) -> Self {
        Segment::Document {
            label: doc.label,
            contents: doc.contents,
        }
    }
}

/// Concatenate segments into the final prompt text
pub fn compose(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(Segment::render)
        .collect::<Vec<_>>()
        .join(SEGMENT_SEPARATOR)
}

/// An immutable, fully assembled prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    segments: Vec<Segment>,
}

impl PromptPayload {
    /// Start building a payload
    pub fn builder() -> PromptBuilder {
        PromptBuilder::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Render the payload text
    pub fn render(&self) -> String {
        compose(&self.segments)
    }
}

/// Builder for [`PromptPayload`]
#[derive(Debug, Default)]
pub struct PromptBuilder {
    segments: Vec<Segment>,
}

impl PromptBuilder {
    /// Append literal text
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.segments.push(Segment::text(text));
        self
    }

    /// Append a guidance document
    pub fn document(mut self, doc: Document) -> Self {
        self.segments.push(doc.into());
        self
    }

    pub fn build(self) -> PromptPayload {
        PromptPayload {
            segments: self.segments,
        }
    }
}

/// Keep at most `max` leading bytes of `text`
///
/// The cut lands on a char boundary and a marker records how much was kept.
pub fn excerpt_head(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }

    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }

    format!(
        "{}\n[... truncated: showing first {} of {} bytes ...]",
        &text[..end],
        end,
        text.len()
    )
}

/// Keep at most `max` trailing bytes of `text`
///
/// Failure output is most useful at its end, where summaries are printed.
pub fn excerpt_tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }

    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }

    format!(
        "[... truncated: showing last {} of {} bytes ...]\n{}",
        text.len() - start,
        text.len(),
        &text[start..]
    )
}
