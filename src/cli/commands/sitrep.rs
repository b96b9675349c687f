//! SITREP history command implementation.

use super::switch::print_snapshot;
use super::{print_json, AppContext};
use crate::error::{Error, Result};

use colored::Colorize;

/// Print the latest `limit` snapshots for a repository, newest first.
///
/// # Errors
///
/// Returns `RepoNotFound` for an unknown id, `InvalidArgument` for a zero
/// limit, or a storage error.
pub fn execute(ctx: &AppContext, repo_id: &str, limit: usize, json: bool) -> Result<()> {
    ctx.config.repo(repo_id)?;
    if limit == 0 {
        return Err(Error::InvalidArgument("--limit must be at least 1".to_string()));
    }

    let storage = ctx.open_storage()?;
    let snapshots = storage.list_snapshots(repo_id, limit)?;
    storage.close()?;

    if json {
        return print_json(&snapshots);
    }

    if snapshots.is_empty() {
        println!("{}", "No previous snapshot found.".italic());
        return Ok(());
    }

    println!("{}", format!("SITREP history for {repo_id}").bold());
    for (i, snapshot) in snapshots.iter().enumerate() {
        if i > 0 {
            println!("{}", "─".repeat(40).dimmed());
        }
        print_snapshot(snapshot);
    }
    Ok(())
}
