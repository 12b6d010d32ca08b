//! CLI command implementations

pub mod config;
pub mod next;
pub mod once;
pub mod run;

pub use once::OnceArgs;
pub use run::RunArgs;
