//! Backlog prioritization
//!
//! The backlog is rebuilt from the tracker on every call; nothing is cached.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::ticket::{most_recent_completed_prd, sort_backlog, IssueSummary, Ticket, TicketState};
use crate::Result;

/// Issue tracker collaborator
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// List issues in the given state, at most `limit` of them
    async fn list_issues(&self, state: TicketState, limit: usize) -> Result<Vec<IssueSummary>>;

    /// Fetch the full record of one issue
    async fn get_ticket(&self, number: u64) -> Result<Ticket>;
}

/// Outcome of a backlog query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The highest-priority open ticket
    Ticket(Ticket),
    /// No open tickets; carries the highest PRD seen on closed tickets, if any
    NoTicket {
        most_recent_completed_prd: Option<String>,
    },
}

/// Picks the next ticket to work on
pub struct Backlog<'a> {
    tracker: &'a dyn IssueTracker,
    limit: usize,
}

impl<'a> Backlog<'a> {
    pub fn new(tracker: &'a dyn IssueTracker, limit: usize) -> Self {
        Self { tracker, limit }
    }

    /// Select the next ticket
    ///
    /// Tracker failures are returned as errors, never folded into `NoTicket`,
    /// so an outage cannot be mistaken for an empty backlog.
    pub async fn select_next(&self) -> Result<Selection> {
        let open = self.tracker.list_issues(TicketState::Open, self.limit).await?;
        debug!(count = open.len(), "Fetched open tickets");

        if open.is_empty() {
            let closed = self
                .tracker
                .list_issues(TicketState::Closed, self.limit)
                .await?;
            let prd = most_recent_completed_prd(&closed);
            info!(closed = closed.len(), most_recent_prd = ?prd, "No open tickets");
            return Ok(Selection::NoTicket {
                most_recent_completed_prd: prd,
            });
        }

        let backlog = sort_backlog(open);
        let winner = &backlog[0];
        let tag = winner.tag();
        info!(
            number = winner.number,
            title = %winner.title,
            tagged = tag.has_tag,
            prd = tag.prd_number,
            ticket = tag.ticket_number,
            "Selected next ticket"
        );

        let ticket = self.tracker.get_ticket(winner.number).await?;
        Ok(Selection::Ticket(ticket))
    }
}
