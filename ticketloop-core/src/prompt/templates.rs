//! Payload builders for each kind of dispatch
//!
//! Ticket prompts mention the ticket as `#N` exactly once, in the opening
//! line; the metadata block below it never repeats the number.

use crate::guidance::Document;
use crate::ticket::Ticket;

use super::{excerpt_head, excerpt_tail, PromptPayload};

const ONE_CONCERN_RULE: &str = "Fix only this problem. Do not start ticket work, do not \
create planning documents, and stop once the fix is committed and pushed.";

/// Render ticket fields without the ticket number
fn ticket_metadata(ticket: &Ticket) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.join(", ")
        }
    };
    let body = if ticket.body.trim().is_empty() {
        "(no description)"
    } else {
        ticket.body.trim_end()
    };

    format!(
        "Title: {}\nURL: {}\nAuthor: {}\nLabels: {}\nAssignees: {}\nState: {}\n\nDescription:\n{}",
        ticket.title,
        ticket.url,
        ticket.author,
        list(&ticket.labels),
        list(&ticket.assignees),
        ticket.state,
        body
    )
}

fn fenced(lang: &str, body: &str) -> String {
    format!("```{}\n{}\n```", lang, body.trim_end_matches('\n'))
}

/// Local commits could not be pushed
pub fn push_conflict(remote: &str, push_output: &str, max_output: usize) -> PromptPayload {
    PromptPayload::builder()
        .text(format!(
            "Pushing the local commits to `{}` failed. Bring the branch back in sync: fetch, \
             rebase or merge the upstream changes, resolve every conflict, make sure the \
             formatter, linter, type checker and tests still pass, then push.",
            remote
        ))
        .text(format!(
            "Output of the failed push:\n{}",
            fenced("text", &excerpt_tail(push_output, max_output))
        ))
        .text(ONE_CONCERN_RULE)
        .build()
}

/// The unit test gate failed
pub fn fix_unit_tests(guidance: Document, test_output: &str, max_output: usize) -> PromptPayload {
    PromptPayload::builder()
        .text("The unit test suite is failing. Make it pass.")
        .document(guidance)
        .text(format!(
            "Output of the failing run:\n{}",
            fenced("text", &excerpt_tail(test_output, max_output))
        ))
        .text(ONE_CONCERN_RULE)
        .build()
}

/// The end-to-end test gate failed
pub fn fix_e2e_tests(guidance: Document, test_output: &str, max_output: usize) -> PromptPayload {
    PromptPayload::builder()
        .text("The end-to-end test suite is failing. Make it pass.")
        .document(guidance)
        .text(format!(
            "Output of the failing run:\n{}",
            fenced("text", &excerpt_tail(test_output, max_output))
        ))
        .text(ONE_CONCERN_RULE)
        .build()
}

/// Static type checking failed on a clean tree
pub fn fix_typecheck(check_output: &str, max_output: usize) -> PromptPayload {
    PromptPayload::builder()
        .text(
            "Static type checking fails on the committed code. Fix every type error, run the \
             formatter, linter and both test suites, then commit and push the fix.",
        )
        .text(format!(
            "Type checker output:\n{}",
            fenced("text", &excerpt_tail(check_output, max_output))
        ))
        .text(ONE_CONCERN_RULE)
        .build()
}

/// Start work on the selected ticket
pub fn work_ticket(ticket: &Ticket, process: Document) -> PromptPayload {
    PromptPayload::builder()
        .text(format!("Work on ticket #{}.", ticket.number))
        .text(ticket_metadata(ticket))
        .document(process)
        .text(
            "Rules: work on exactly this one ticket. When it is implemented, committed, pushed \
             and closed, stop. Do not continue with another ticket and do not create PRDs, \
             ERDs or new tickets.",
        )
        .build()
}

/// No open tickets remain: plan the next PRD from the roadmap
pub fn plan_next_prd(
    most_recent_completed_prd: Option<&str>,
    roadmap: Document,
    prd_template: Document,
    erd_template: Document,
    ticket_template: Document,
) -> PromptPayload {
    let progress = match most_recent_completed_prd {
        Some(prd) => format!(
            "The most recently completed PRD is PRD-{}. Pick the next roadmap item after it and \
             give the new PRD the next number.",
            prd
        ),
        None => "No PRD has been completed yet. Start with the first roadmap item and number \
                 the PRD 0001."
            .to_string(),
    };

    PromptPayload::builder()
        .text("There are no open tickets. Read the roadmap and plan the next piece of work.")
        .text(progress)
        .document(roadmap)
        .text("Write the PRD using this template:")
        .document(prd_template)
        .text("Write the ERD for the PRD using this template:")
        .document(erd_template)
        .text(
            "Break the PRD into tickets in the issue tracker using this template, one issue \
             per ticket, tagged in implementation order:",
        )
        .document(ticket_template)
        .text(
            "Rules: create the PRD, the ERD and the tickets only. Do not begin implementing \
             any of the tickets. Commit and push the documents, then stop.",
        )
        .build()
}

/// Staged work exists and matches the top ticket
pub fn continue_ticket(ticket: &Ticket, staged_diff: &str, max_diff: usize) -> PromptPayload {
    PromptPayload::builder()
        .text(format!(
            "Continue the work in progress on ticket #{}. The staging area already holds \
             changes for it.",
            ticket.number
        ))
        .text(ticket_metadata(ticket))
        .text(format!(
            "Staged changes so far:\n{}",
            fenced("diff", &excerpt_head(staged_diff, max_diff))
        ))
        .text(
            "Rules: finish this ticket only. Run the formatter, linter, type checker and both \
             test suites, commit, push and close the ticket, then stop.",
        )
        .build()
}

/// Staged work exists but no ticket could be matched to it
pub fn continue_unmatched(staged_diff: &str, max_diff: usize) -> PromptPayload {
    PromptPayload::builder()
        .text(
            "The staging area holds uncommitted work, but it could not be matched to an open \
             ticket. Inspect the issue tracker yourself and use the staged changes below to \
             find the ticket they belong to.",
        )
        .text(format!(
            "Staged changes:\n{}",
            fenced("diff", &excerpt_head(staged_diff, max_diff))
        ))
        .text(
            "Rules: finish that one ticket. Run the formatter, linter, type checker and both \
             test suites, commit, push and close it, then stop. If the changes belong to no \
             ticket, commit them with a descriptive message and stop.",
        )
        .build()
}
