//! Ticketloop GitHub - GitHub Issues as the ticketloop backlog
//!
//! This crate implements the core `IssueTracker` seam on top of the GitHub
//! REST API.

mod client;
mod error;
mod issues;

pub use client::{parse_github_url, GitHubClient};
pub use error::{Error, Result};
