//! Secrets management for ticketloop
//!
//! Secrets live outside the project config so they never end up committed.
//! The secrets file is `~/.config/ticketloop/secrets.toml` and must have
//! restrictive permissions (0600 on Unix).
//!
//! Token lookup order:
//! 1. `GITHUB_TOKEN` environment variable
//! 2. Secrets file
//! 3. `gh auth token` (the GitHub CLI's stored login)

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// GitHub configuration
    pub github: GitHubSecrets,
}

/// GitHub-related secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubSecrets {
    /// GitHub Personal Access Token
    pub token: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if the file doesn't exist
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path).map_err(Error::Io)?.permissions().mode();

            // Readable by group or others
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }

        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        if let Some(ref mut token) = secrets.github.token {
            *token = token.trim().to_string();
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/ticketloop/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ticketloop").join("secrets.toml"))
    }

    /// Resolve the GitHub token
    pub fn github_token(&self) -> Option<String> {
        let env_token = std::env::var("GITHUB_TOKEN").ok();
        choose_token(env_token, self.github.token.clone(), gh_cli_token)
    }
}

/// Pick the first non-blank token, consulting the GitHub CLI only as a last resort
fn choose_token(
    env_token: Option<String>,
    file_token: Option<String>,
    gh_fallback: impl FnOnce() -> Option<String>,
) -> Option<String> {
    let non_blank = |t: Option<String>| t.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

    if let Some(token) = non_blank(env_token) {
        debug!("Using GitHub token from GITHUB_TOKEN environment variable");
        return Some(token);
    }

    if let Some(token) = non_blank(file_token) {
        debug!("Using GitHub token from secrets file");
        return Some(token);
    }

    let token = non_blank(gh_fallback());
    if token.is_some() {
        debug!("Using GitHub token from gh auth token");
    }
    token
}

fn gh_cli_token() -> Option<String> {
    let output = Command::new("gh")
        .args(["auth", "token"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}
