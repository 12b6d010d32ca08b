//! Ticketloop CLI - Command line interface for the autonomous ticket loop
//!
//! Keeps a repository moving through its GitHub ticket backlog with Claude Code.

mod commands;
mod workspace;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ticketloop_core::config::CliOverrides;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{OnceArgs, RunArgs};
use workspace::Workspace;

/// Ticketloop: work through a ticket backlog one agent dispatch at a time
#[derive(Parser, Debug)]
#[command(name = "ticketloop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to claude executable (overrides config)
    #[arg(long, global = true, env = "TICKETLOOP_CLAUDE_PATH")]
    claude_path: Option<String>,

    /// Model to use (overrides config)
    #[arg(long, global = true, env = "TICKETLOOP_MODEL")]
    model: Option<String>,

    /// GitHub repository as owner/repo (defaults to the git remote)
    #[arg(long, global = true, env = "TICKETLOOP_REPO")]
    repo: Option<String>,

    /// Repository to operate on
    #[arg(short = 'C', long, global = true, default_value = ".")]
    workdir: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Run the loop for a number of iterations (0 = until interrupted)
    #[command(visible_alias = "loop")]
    Run(RunArgs),

    /// Run a single cycle
    Once(OnceArgs),

    /// Show which ticket the loop would pick next
    Next,

    /// Show the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let overrides = CliOverrides {
        claude_path: cli.claude_path.clone(),
        model: cli.model.clone(),
        repo: cli.repo.clone(),
    };

    match cli.command {
        Some(Commands::Version) => {
            println!("ticketloop {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Run(args)) => {
            let workspace = Workspace::open(&cli.workdir, overrides)?;
            args.execute(&workspace, cli.verbose).await?;
        }
        Some(Commands::Once(args)) => {
            let workspace = Workspace::open(&cli.workdir, overrides)?;
            args.execute(&workspace, cli.verbose).await?;
        }
        Some(Commands::Next) => {
            let workspace = Workspace::open(&cli.workdir, overrides)?;
            commands::next::execute(&workspace).await?;
        }
        Some(Commands::Config) => {
            let workspace = Workspace::open(&cli.workdir, overrides)?;
            commands::config::execute(&workspace);
        }
        None => {
            println!("Ticketloop - autonomous ticket loop");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
