//! GitHub Issues as the loop's issue tracker

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ticketloop_core::{IssueSummary, IssueTracker, Ticket, TicketState};
use tracing::{debug, info};

use crate::{Error, GitHubClient, Result};

/// Largest page the REST API serves
const MAX_PER_PAGE: usize = 100;

/// Issue fields the loop reads
///
/// Deserialized directly instead of through octocrab's full issue model so
/// that only these fields have to be present.
#[derive(Debug, Clone, Deserialize)]
struct RawIssue {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: String,
    state: String,
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    labels: Vec<RawLabel>,
    #[serde(default)]
    assignees: Vec<RawUser>,
    /// Present when the entry is a pull request
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawUser {
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Serialize)]
struct ListParams {
    state: &'static str,
    per_page: usize,
    page: u32,
}

fn state_param(state: TicketState) -> &'static str {
    match state {
        TicketState::Open => "open",
        TicketState::Closed => "closed",
    }
}

impl RawIssue {
    fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    fn state(&self) -> TicketState {
        if self.state.eq_ignore_ascii_case("closed") {
            TicketState::Closed
        } else {
            TicketState::Open
        }
    }

    fn summary(&self) -> IssueSummary {
        IssueSummary::new(self.number, self.title.clone(), self.state())
    }

    fn into_ticket(self) -> Ticket {
        let state = self.state();
        Ticket {
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            url: self.html_url,
            author: self.user.map(|u| u.login).unwrap_or_default(),
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            assignees: self.assignees.into_iter().map(|u| u.login).collect(),
            state,
        }
    }
}

impl GitHubClient {
    fn issues_route(&self) -> String {
        format!("/repos/{}/{}/issues", self.owner(), self.repo())
    }

    /// List issues in a state, paginating until `limit` issues were collected
    /// or the pages run out; pull requests are skipped
    pub async fn list_issue_summaries(
        &self,
        state: TicketState,
        limit: usize,
    ) -> Result<Vec<IssueSummary>> {
        debug!(state = %state, limit, "Listing issues");

        let route = self.issues_route();
        let mut summaries = Vec::new();
        let mut page = 1u32;

        while summaries.len() < limit {
            let params = ListParams {
                state: state_param(state),
                per_page: MAX_PER_PAGE,
                page,
            };
            let items: Vec<RawIssue> = self.client().get(&route, Some(&params)).await?;
            let last_page = items.len() < MAX_PER_PAGE;

            summaries.extend(
                items
                    .iter()
                    .filter(|i| !i.is_pull_request())
                    .map(RawIssue::summary),
            );

            if last_page {
                break;
            }
            page += 1;
        }

        summaries.truncate(limit);
        info!(state = %state, count = summaries.len(), "Fetched issues");
        Ok(summaries)
    }

    /// Fetch a single issue by number
    pub async fn fetch_ticket(&self, number: u64) -> Result<Ticket> {
        debug!(number, "Fetching issue");

        let route = format!("{}/{}", self.issues_route(), number);
        let issue: RawIssue = self
            .client()
            .get(&route, None::<&()>)
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found") => {
                    Error::IssueNotFound(number)
                }
                _ => Error::Api(e),
            })?;

        if issue.is_pull_request() {
            return Err(Error::IssueNotFound(number));
        }

        Ok(issue.into_ticket())
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn list_issues(
        &self,
        state: TicketState,
        limit: usize,
    ) -> ticketloop_core::Result<Vec<IssueSummary>> {
        Ok(self.list_issue_summaries(state, limit).await?)
    }

    async fn get_ticket(&self, number: u64) -> ticketloop_core::Result<Ticket> {
        Ok(self.fetch_ticket(number).await?)
    }
}
