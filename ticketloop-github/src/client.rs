//! Authenticated octocrab client bound to one repository

use octocrab::Octocrab;
use ticketloop_core::Secrets;
use tracing::info;

use crate::{Error, Result};

/// GitHub API client scoped to one repository
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Authenticate against `owner/repo`
    ///
    /// The token comes from `Secrets::github_token`: the environment, the
    /// secrets file, then the GitHub CLI login.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        let secrets = Secrets::load().map_err(|e| Error::Auth(e.to_string()))?;

        let token = secrets.github_token().ok_or_else(|| {
            Error::Auth(
                "GitHub token not found. Set GITHUB_TOKEN, add a token to \
                 ~/.config/ticketloop/secrets.toml, or log in with `gh auth login`"
                    .to_string(),
            )
        })?;

        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| Error::Auth(format!("Could not build the GitHub client: {}", e)))?;

        info!(repository = %format!("{}/{}", owner, repo), "GitHub tracker ready");

        Ok(Self {
            client,
            owner,
            repo,
        })
    }

    /// Authenticate against any reference `parse_github_url` accepts,
    /// typically the git remote URL
    pub fn from_url(url: &str) -> Result<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Self::new(owner, repo)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn client(&self) -> &Octocrab {
        &self.client
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Split a repository reference into `(owner, repo)`
///
/// Accepts `owner/repo`, https URLs, scp-style `git@host:owner/repo.git`
/// and `ssh://` URLs.
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    let invalid = || Error::Parse(format!("Invalid repository format: {}. Expected owner/repo", url));

    if url.starts_with("https://") || url.starts_with("http://") {
        let parsed = url::Url::parse(url).map_err(|e| Error::Parse(e.to_string()))?;
        return split_path(parsed.path())
            .ok_or_else(|| Error::Parse(format!("Invalid GitHub URL path: {}", parsed.path())));
    }

    if let Some(rest) = url.strip_prefix("ssh://") {
        // ssh://git@github.com/owner/repo.git
        let path = rest.split_once('/').map(|(_, p)| p).ok_or_else(invalid)?;
        return split_path(path).ok_or_else(invalid);
    }

    if url.starts_with("git@") {
        let path = url
            .split_once(':')
            .map(|(_, p)| p)
            .ok_or_else(|| Error::Parse(format!("Invalid SSH URL: {}", url)))?;
        return split_path(path).ok_or_else(|| Error::Parse(format!("Invalid SSH URL: {}", url)));
    }

    // owner/repo shorthand
    let parts: Vec<&str> = url.split('/').collect();
    match parts.as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.trim_end_matches(".git").to_string()))
        }
        _ => Err(invalid()),
    }
}

fn split_path(path: &str) -> Option<(String, String)> {
    let path = path.trim_matches('/').trim_end_matches(".git");
    let mut parts = path.split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Some((owner.to_string(), repo.to_string()))
        }
        _ => None,
    }
}
