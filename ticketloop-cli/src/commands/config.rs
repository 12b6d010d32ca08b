//! Config command - show the effective configuration

use ticketloop_core::config::PROJECT_CONFIG_FILE;
use ticketloop_core::Config;

use crate::workspace::Workspace;

fn or_skip(command: &str) -> &str {
    if command.trim().is_empty() {
        "(skipped)"
    } else {
        command
    }
}

pub fn execute(workspace: &Workspace) {
    let config = workspace.config();

    println!("Ticketloop Configuration");
    println!("========================");
    println!();
    println!("Repository: {}", workspace.root().display());
    println!();
    println!("Agent Settings:");
    println!("  claude_path: {}", config.agent.claude_path);
    println!("  model: {}", config.agent.model.as_deref().unwrap_or("(default)"));
    println!();
    println!("Tracker:");
    println!("  repo: {}", config.tracker.repo.as_deref().unwrap_or("(from git remote)"));
    println!("  issue_limit: {}", config.tracker.issue_limit);
    println!();
    println!("Gates:");
    println!("  format: {}", or_skip(&config.gates.format));
    println!("  lint: {}", or_skip(&config.gates.lint));
    println!("  install: {}", or_skip(&config.gates.install));
    println!("  migrate: {}", or_skip(&config.gates.migrate));
    println!("  unit_tests: {}", or_skip(&config.gates.unit_tests));
    println!("  e2e_tests: {}", or_skip(&config.gates.e2e_tests));
    println!("  typecheck: {}", or_skip(&config.gates.typecheck));
    println!();
    println!("Prompt limits:");
    println!("  max_diff_bytes: {}", config.prompt.max_diff_bytes);
    println!("  max_output_bytes: {}", config.prompt.max_output_bytes);
    println!();

    let project = workspace.root().join(PROJECT_CONFIG_FILE);
    println!("Project config: {}", project.display());
    println!("  {}", if project.exists() { "(exists)" } else { "(not found)" });
    if let Some(path) = Config::default_config_path() {
        println!("User config: {}", path.display());
        println!("  {}", if path.exists() { "(exists)" } else { "(not found)" });
    }
}
