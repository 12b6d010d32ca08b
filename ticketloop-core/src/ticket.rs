//! Ticket model and backlog ordering
//!
//! Tickets are ordered by a `[PRD-XXXX-TICKET-XXX]` tag embedded in their
//! title. Tagged tickets always come before untagged ones; untagged tickets
//! get sentinel keys so they sort last among themselves in tracker order.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Key given to untagged tickets
pub const UNTAGGED_SENTINEL: u32 = 99_999;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[PRD-(\d+)-TICKET-(\d+)\]").expect("ticket tag pattern is valid")
});

/// Ticket state in the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketState {
    Open,
    Closed,
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketState::Open => write!(f, "open"),
            TicketState::Closed => write!(f, "closed"),
        }
    }
}

/// The subset of a ticket returned by list queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    pub state: TicketState,
}

impl IssueSummary {
    pub fn new(number: u64, title: impl Into<String>, state: TicketState) -> Self {
        Self {
            number,
            title: title.into(),
            state,
        }
    }

    /// Ordering key parsed from the title
    pub fn tag(&self) -> TicketTag {
        TicketTag::parse(&self.title)
    }
}

/// Full ticket record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub url: String,
    pub author: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub state: TicketState,
}

impl Ticket {
    /// Ordering key parsed from the title
    pub fn tag(&self) -> TicketTag {
        TicketTag::parse(&self.title)
    }
}

/// PRD/ticket ordering key derived from a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TicketTag {
    pub has_tag: bool,
    pub prd_number: u32,
    pub ticket_number: u32,
}

impl TicketTag {
    /// Key for titles without a tag
    pub const UNTAGGED: TicketTag = TicketTag {
        has_tag: false,
        prd_number: UNTAGGED_SENTINEL,
        ticket_number: UNTAGGED_SENTINEL,
    };

    /// Parse the first `[PRD-<digits>-TICKET-<digits>]` occurrence in a title
    pub fn parse(title: &str) -> Self {
        let Some(caps) = TAG_PATTERN.captures(title) else {
            return Self::UNTAGGED;
        };

        // digits too long for u32 cannot be compared meaningfully
        match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
            (Ok(prd_number), Ok(ticket_number)) => Self {
                has_tag: true,
                prd_number,
                ticket_number,
            },
            _ => Self::UNTAGGED,
        }
    }

    /// Sort key: tagged first, then PRD, then ticket
    fn sort_key(&self) -> (bool, u32, u32) {
        (!self.has_tag, self.prd_number, self.ticket_number)
    }
}

/// Order open tickets for selection
///
/// Stable: entries with identical keys keep the order the tracker returned them in.
pub fn sort_backlog(mut issues: Vec<IssueSummary>) -> Vec<IssueSummary> {
    issues.sort_by_cached_key(|issue| issue.tag().sort_key());
    issues
}

/// Highest PRD number among tagged tickets, zero-padded to four digits
pub fn most_recent_completed_prd(closed: &[IssueSummary]) -> Option<String> {
    closed
        .iter()
        .map(IssueSummary::tag)
        .filter(|tag| tag.has_tag)
        .map(|tag| tag.prd_number)
        .max()
        .map(|prd| format!("{:04}", prd))
}
