//! Next command - preview the backlog selection

use ticketloop_core::{Backlog, Selection};

use crate::workspace::Workspace;

pub async fn execute(workspace: &Workspace) -> anyhow::Result<()> {
    let tracker = workspace.tracker()?;
    let backlog = Backlog::new(&tracker, workspace.config().tracker.issue_limit);

    match backlog.select_next().await? {
        Selection::Ticket(ticket) => {
            let tag = ticket.tag();
            println!("Next ticket: #{} {}", ticket.number, ticket.title);
            if tag.has_tag {
                println!("  PRD {:04}, ticket {:03}", tag.prd_number, tag.ticket_number);
            } else {
                println!("  (untagged)");
            }
            println!("  {}", ticket.url);
        }
        Selection::NoTicket {
            most_recent_completed_prd,
        } => {
            println!("No open tickets; the loop would plan the next PRD.");
            match most_recent_completed_prd {
                Some(prd) => println!("Most recently completed PRD: {}", prd),
                None => println!("No completed PRDs yet."),
            }
        }
    }

    Ok(())
}
