//! Status command implementation.

use super::{print_json, runtime, AppContext};
use crate::capture::{get_status, GitStatus};
use crate::error::Result;
use crate::model::format_millis;

use colored::Colorize;
use serde::Serialize;

/// One row of the status table.
#[derive(Debug, Serialize)]
struct RepoStatus {
    id: String,
    priority: i64,
    branch: String,
    git: String,
    uncommitted: usize,
    last_snapshot: Option<i64>,
}

/// Git column text for a collected status.
fn git_label(status: &GitStatus) -> String {
    if status.is_dirty {
        return format!("Dirty ({})", status.uncommitted_files.len());
    }
    match status.branch.as_str() {
        "unknown" => "Not Git".to_string(),
        "error" => "Error".to_string(),
        "timeout" => "Timeout".to_string(),
        _ => "Clean".to_string(),
    }
}

fn priority_label(priority: i64) -> String {
    let icon = if priority >= 8 { "🔥" } else { "⚡" };
    format!("{icon} {priority}")
}

/// Print git state and last snapshot time for every repository.
///
/// # Errors
///
/// Returns an error if the snapshot store cannot be opened or read.
pub fn execute(ctx: &AppContext, json: bool) -> Result<()> {
    let storage = ctx.open_storage()?;
    let rt = runtime()?;

    let mut rows = Vec::new();
    for repo in ctx.config.repos_by_priority() {
        let git = if ctx.mock() {
            GitStatus {
                branch: "mock".to_string(),
                is_dirty: false,
                uncommitted_files: Vec::new(),
                diff_stat: String::new(),
            }
        } else {
            rt.block_on(get_status(&repo.path))
        };

        let last_snapshot = match storage.latest_snapshot(&repo.id) {
            Ok(snapshot) => snapshot.map(|s| s.timestamp),
            Err(e) => {
                tracing::warn!(repo = %repo.id, error = %e, "Error fetching snapshot");
                None
            }
        };

        rows.push(RepoStatus {
            id: repo.id.clone(),
            priority: repo.priority,
            git: git_label(&git),
            uncommitted: git.uncommitted_files.len(),
            branch: git.branch,
            last_snapshot,
        });
    }
    storage.close()?;

    if json {
        return print_json(&rows);
    }

    println!("{}", "Prime Directive Status".bold());
    println!(
        "{:<16} {:<8} {:<20} {:<12} {}",
        "Project".cyan().bold(),
        "Priority",
        "Branch".green().bold(),
        "Git Status".bold(),
        "Last Snapshot".blue().bold()
    );
    for row in &rows {
        let git = if row.git == "Clean" {
            row.git.green()
        } else if row.git.starts_with("Dirty") {
            row.git.red()
        } else {
            row.git.yellow()
        };
        let last = row
            .last_snapshot
            .map_or_else(|| "Never".to_string(), format_millis);
        println!(
            "{:<16} {:<8} {:<20} {:<12} {}",
            row.id.cyan(),
            priority_label(row.priority),
            row.branch.green(),
            git,
            last.blue()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(branch: &str, files: &[&str]) -> GitStatus {
        GitStatus {
            branch: branch.to_string(),
            is_dirty: !files.is_empty(),
            uncommitted_files: files.iter().map(|f| (*f).to_string()).collect(),
            diff_stat: String::new(),
        }
    }

    #[test]
    fn test_git_label() {
        assert_eq!(git_label(&status("main", &[])), "Clean");
        assert_eq!(git_label(&status("main", &["a.rs", "b.rs"])), "Dirty (2)");
        assert_eq!(git_label(&status("unknown", &[])), "Not Git");
        assert_eq!(git_label(&status("timeout", &[])), "Timeout");
        assert_eq!(git_label(&status("error", &[])), "Error");
    }

    #[test]
    fn test_priority_label() {
        assert_eq!(priority_label(9), "🔥 9");
        assert_eq!(priority_label(3), "⚡ 3");
    }
}
