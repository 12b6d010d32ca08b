//! Configuration management for ticketloop
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (TICKETLOOP_*)
//! 3. Project file (`<repo>/ticketloop.toml`)
//! 4. User file (~/.config/ticketloop/config.toml)
//! 5. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of the per-project config file, looked up at the repository root
pub const PROJECT_CONFIG_FILE: &str = "ticketloop.toml";

/// Agent-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Path to the claude executable
    pub claude_path: String,

    /// Model to use for Claude
    pub model: Option<String>,

    /// Tools passed through `--allowed-tools` (empty = agent default)
    pub allowed_tools: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            claude_path: "claude".to_string(),
            model: None, // Let claude use its default
            allowed_tools: Vec::new(),
        }
    }
}

/// Issue tracker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Repository in owner/repo form; derived from the git remote when unset
    pub repo: Option<String>,

    /// Upper bound on issues fetched per listing
    pub issue_limit: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            repo: None,
            issue_limit: 10_000,
        }
    }
}

/// Version control configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitConfig {
    /// Remote used for fetch, pull and push
    pub remote: String,

    /// Commit message for formatting-only cleanup commits
    pub format_commit_message: String,

    /// Commit message for lint-fix-only cleanup commits
    pub lint_commit_message: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            format_commit_message: "style: apply automatic formatting".to_string(),
            lint_commit_message: "style: apply automatic lint fixes".to_string(),
        }
    }
}

/// Shell commands backing each quality gate
///
/// An empty command disables the gate.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatesConfig {
    pub format: String,
    pub lint: String,
    pub install: String,
    pub migrate: String,
    pub unit_tests: String,
    pub e2e_tests: String,
    pub typecheck: String,
}

impl Default for GatesConfig {
    fn default() -> Self {
        Self {
            format: "npm run format".to_string(),
            lint: "npm run lint -- --fix".to_string(),
            install: "npm install".to_string(),
            migrate: "npx prisma migrate deploy".to_string(),
            unit_tests: "npm run test".to_string(),
            e2e_tests: "npm run test:e2e".to_string(),
            typecheck: "npx tsc --noEmit".to_string(),
        }
    }
}

/// Repository-relative locations of the guidance documents
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuidanceConfig {
    pub roadmap: String,
    pub prd_template: String,
    pub erd_template: String,
    pub ticket_template: String,
    pub implementation_process: String,
    pub fix_unit_tests: String,
    pub fix_e2e_tests: String,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            roadmap: "docs/ROADMAP.md".to_string(),
            prd_template: "prompts/prd-template.md".to_string(),
            erd_template: "prompts/erd-template.md".to_string(),
            ticket_template: "prompts/ticket-template.md".to_string(),
            implementation_process: "prompts/implementation-process.md".to_string(),
            fix_unit_tests: "prompts/fix-unit-tests.md".to_string(),
            fix_e2e_tests: "prompts/fix-e2e-tests.md".to_string(),
        }
    }
}

/// Limits applied when embedding runtime data into prompts
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Maximum bytes of staged diff embedded in a continue prompt
    pub max_diff_bytes: usize,

    /// Maximum bytes of command output embedded in a remediation prompt
    pub max_output_bytes: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_diff_bytes: 60_000,
            max_output_bytes: 20_000,
        }
    }
}

/// Outer loop configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Pause between two iterations
    #[serde(with = "humantime_serde")]
    pub iteration_delay: Duration,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub tracker: TrackerConfig,
    pub git: GitConfig,
    pub gates: GatesConfig,
    pub guidance: GuidanceConfig,
    pub prompt: PromptConfig,
    #[serde(rename = "loop")]
    pub loop_: LoopConfig,
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
    contents
        .parse::<toml::Table>()
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Recursively overlay `overlay` onto `base`; tables merge, other values replace
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let value = match (base.remove(&key), value) {
            (Some(toml::Value::Table(mut existing)), toml::Value::Table(incoming)) => {
                merge_tables(&mut existing, incoming);
                toml::Value::Table(existing)
            }
            (_, value) => value,
        };
        base.insert(key, value);
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub claude_path: Option<String>,
    pub model: Option<String>,
    pub repo: Option<String>,
}

impl Config {
    /// Load configuration for a repository
    ///
    /// The project file is layered over the user file key by key; anything
    /// neither sets keeps its default.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let user = Self::default_config_path();
        Self::load_layered(user.as_deref(), &repo_root.join(PROJECT_CONFIG_FILE))
    }

    /// Merge `project` over `user`; files that do not exist are skipped
    pub fn load_layered(user: Option<&Path>, project: &Path) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in user.into_iter().chain(std::iter::once(project)) {
            if path.exists() {
                merge_tables(&mut merged, read_table(path)?);
            }
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get the user config file path
    ///
    /// Returns `~/.config/ticketloop/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ticketloop").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - TICKETLOOP_CLAUDE_PATH: Path to claude executable
    /// - TICKETLOOP_MODEL: Model to use
    /// - TICKETLOOP_REPO: Tracker repository (owner/repo)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(claude_path) = std::env::var("TICKETLOOP_CLAUDE_PATH") {
            self.agent.claude_path = claude_path;
        }

        if let Ok(model) = std::env::var("TICKETLOOP_MODEL") {
            self.agent.model = Some(model);
        }

        if let Ok(repo) = std::env::var("TICKETLOOP_REPO") {
            self.tracker.repo = Some(repo);
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(path) = overrides.claude_path {
            self.agent.claude_path = path;
        }

        if let Some(m) = overrides.model {
            self.agent.model = Some(m);
        }

        if let Some(repo) = overrides.repo {
            self.tracker.repo = Some(repo);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > project file > user file > defaults
    pub fn load_with_overrides(repo_root: &Path, overrides: CliOverrides) -> Result<Self> {
        Ok(Self::load(repo_root)?
            .with_env_overrides()
            .with_cli_overrides(overrides))
    }
}
