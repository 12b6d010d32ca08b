//! Error types for ticketloop

use thiserror::Error;

/// Result type alias for ticketloop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for ticketloop operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local repository inspection failed
    #[error("Git error: {0}")]
    Git(String),

    /// Fetching from or pulling the remote failed
    #[error("Sync failure: {0}")]
    Sync(String),

    /// A local cleanup commit was refused, e.g. by a pre-commit hook
    #[error("Commit failed: {0}")]
    Commit(String),

    /// Issue tracker could not be queried
    #[error("Tracker lookup failure: {0}")]
    Tracker(String),

    /// A quality gate command could not be launched
    #[error("Gate error: {0}")]
    Gate(String),

    /// Agent execution error
    #[error("Agent error: {0}")]
    Agent(String),

    /// A required guidance document is missing or unreadable
    #[error("Guidance error: {0}")]
    Guidance(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error should abort the whole run rather than just the current cycle
    ///
    /// Tracker errors only reach the loop from the clean-branch backlog
    /// lookup, where no valid dispatch exists without the backlog.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Sync(_) | Error::Tracker(_) | Error::Guidance(_) | Error::Config(_)
        )
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::Git(err.message().to_string())
    }
}
