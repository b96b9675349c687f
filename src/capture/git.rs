//! Git status collection.

use super::{run_command, CommandError};

use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const GIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Summary of a working tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitStatus {
    /// Branch name, or `unknown` / `timeout` / `error` when it could not be read.
    pub branch: String,
    pub is_dirty: bool,
    pub uncommitted_files: Vec<String>,
    pub diff_stat: String,
}

impl GitStatus {
    fn degraded(branch: &str, diff_stat: String) -> Self {
        Self {
            branch: branch.to_string(),
            is_dirty: false,
            uncommitted_files: Vec::new(),
            diff_stat,
        }
    }

    /// Whether the status was actually read from git.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.branch.as_str(), "unknown" | "timeout" | "error")
    }

    /// Text stored in the snapshot and fed to the SITREP prompt.
    #[must_use]
    pub fn summary(&self) -> String {
        let files = if self.uncommitted_files.is_empty() {
            "none".to_string()
        } else {
            self.uncommitted_files.join(", ")
        };
        let diff = if self.diff_stat.is_empty() {
            "none"
        } else {
            self.diff_stat.as_str()
        };
        format!(
            "Branch: {}\nDirty: {}\nFiles: {files}\nDiff: {diff}",
            self.branch,
            if self.is_dirty { "yes" } else { "no" },
        )
    }
}

/// Read branch, porcelain status and diff stat for `repo_path`.
///
/// Never fails: a non-repository yields branch `unknown`, a hung git yields
/// `timeout`, any other failure yields `error`.
pub async fn get_status(repo_path: &Path) -> GitStatus {
    if !repo_path.join(".git").exists() {
        return GitStatus::degraded("unknown", String::new());
    }

    match collect(repo_path).await {
        Ok(status) => status,
        Err(CommandError::Timeout(_)) => {
            tracing::warn!(path = %repo_path.display(), "Git command timed out");
            GitStatus::degraded("timeout", "Git command timed out".to_string())
        }
        Err(e) => {
            tracing::warn!(path = %repo_path.display(), error = %e, "Git status failed");
            GitStatus::degraded("error", e.to_string())
        }
    }
}

async fn collect(repo_path: &Path) -> Result<GitStatus, CommandError> {
    let cwd = Some(repo_path);

    let head = run_command("git", &["rev-parse", "--abbrev-ref", "HEAD"], cwd, GIT_TIMEOUT).await?;
    let branch = if head.success {
        head.stdout.trim().to_string()
    } else {
        "unknown".to_string()
    };

    let status = run_command("git", &["status", "--porcelain"], cwd, GIT_TIMEOUT).await?;
    let uncommitted_files = parse_porcelain(&status.stdout);

    let diff = run_command("git", &["diff", "--stat"], cwd, GIT_TIMEOUT).await?;

    Ok(GitStatus {
        branch,
        is_dirty: !uncommitted_files.is_empty(),
        uncommitted_files,
        diff_stat: diff.stdout.trim().to_string(),
    })
}

/// File paths from `git status --porcelain` (`XY PATH` lines).
fn parse_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.get(2..)?.strip_prefix(' '))
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect()
}
