//! List command implementation.

use super::{print_json, AppContext};
use crate::error::Result;

use colored::Colorize;

/// Print configured repositories, highest priority first.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(ctx: &AppContext, json: bool) -> Result<()> {
    let repos = ctx.config.repos_by_priority();

    if json {
        return print_json(&repos);
    }

    if repos.is_empty() {
        println!("No repositories configured.");
        return Ok(());
    }

    println!("{}", "Prime Directive Repositories".bold());
    println!(
        "{:<16} {:>8}  {:<16} {}",
        "ID".cyan().bold(),
        "Priority".magenta().bold(),
        "Branch".green().bold(),
        "Path".yellow().bold()
    );
    for repo in repos {
        println!(
            "{:<16} {:>8}  {:<16} {}",
            repo.id.cyan(),
            repo.priority.to_string().magenta(),
            repo.active_branch.green(),
            repo.path.display().to_string().yellow()
        );
    }
    Ok(())
}
