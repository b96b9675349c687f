//! Git hook installation.
//!
//! The post-commit hook appends a `COMMIT` event via `pd record-commit`, which
//! `pd metrics` pairs with the preceding `SWITCH_IN`.

use super::{print_json, AppContext};
use crate::config::RepoConfig;
use crate::error::Result;

use colored::Colorize;
use serde::Serialize;
use std::path::Path;

const HOOK_MARKER: &str = "# prime-directive: record commit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookResult {
    Installed,
    AlreadyInstalled,
    NotGit,
}

#[derive(Debug, Serialize)]
struct HookOutput {
    repo_id: String,
    result: HookResult,
}

/// New hook file content, or `None` if `existing` already calls us.
///
/// An existing hook is kept and our line appended.
#[must_use]
pub fn hook_script(existing: Option<&str>, repo_id: &str, pd_bin: &str) -> Option<String> {
    let line = format!(
        "{HOOK_MARKER}\n{} record-commit {} >/dev/null 2>&1 || true\n",
        shell_quote(pd_bin),
        shell_quote(repo_id)
    );
    match existing {
        Some(content) if content.contains(HOOK_MARKER) => None,
        Some(content) if !content.trim().is_empty() => {
            let sep = if content.ends_with('\n') { "" } else { "\n" };
            Some(format!("{content}{sep}\n{line}"))
        }
        _ => Some(format!("#!/bin/sh\n{line}")),
    }
}

/// Single-quote `value` for POSIX sh.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Install the hook into one repository.
///
/// # Errors
///
/// Returns an I/O error if the hook cannot be read or written.
pub fn install_hook(repo: &RepoConfig, pd_bin: &str) -> Result<HookResult> {
    let git_dir = repo.path.join(".git");
    if !git_dir.is_dir() {
        return Ok(HookResult::NotGit);
    }

    let hooks_dir = git_dir.join("hooks");
    std::fs::create_dir_all(&hooks_dir)?;
    let hook = hooks_dir.join("post-commit");
    let existing = match std::fs::read_to_string(&hook) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let Some(script) = hook_script(existing.as_deref(), &repo.id, pd_bin) else {
        return Ok(HookResult::AlreadyInstalled);
    };
    std::fs::write(&hook, script)?;
    make_executable(&hook)?;
    tracing::info!(repo = %repo.id, hook = %hook.display(), "Installed post-commit hook");
    Ok(HookResult::Installed)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o755);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Install hooks for one or all repositories.
///
/// # Errors
///
/// Returns `RepoNotFound` for an unknown id or an I/O error from writing.
pub fn execute(ctx: &AppContext, repo_id: Option<&str>, json: bool) -> Result<()> {
    let repos: Vec<&RepoConfig> = match repo_id {
        Some(id) => vec![ctx.config.repo(id)?],
        None => ctx.config.repos_by_priority(),
    };
    let pd_bin = std::env::current_exe()
        .ok()
        .map_or_else(|| "pd".to_string(), |p| p.display().to_string());

    let mut results = Vec::with_capacity(repos.len());
    for repo in repos {
        let result = install_hook(repo, &pd_bin)?;
        results.push(HookOutput {
            repo_id: repo.id.clone(),
            result,
        });
    }

    if json {
        return print_json(&results);
    }
    for r in &results {
        let text = match r.result {
            HookResult::Installed => "installed".green(),
            HookResult::AlreadyInstalled => "already installed".dimmed(),
            HookResult::NotGit => "not a git repository".yellow(),
        };
        println!("  {:<16} {text}", r.repo_id.cyan());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(path: &Path) -> RepoConfig {
        RepoConfig {
            id: "api".to_string(),
            path: path.to_path_buf(),
            priority: 1,
            active_branch: "main".to_string(),
        }
    }

    #[test]
    fn test_hook_script_fresh_and_appended() {
        let fresh = hook_script(None, "api", "/usr/bin/pd").unwrap();
        assert!(fresh.starts_with("#!/bin/sh\n"));
        assert!(fresh.contains("'/usr/bin/pd' record-commit 'api'"));

        let appended = hook_script(Some("#!/bin/sh\nmake lint"), "api", "pd").unwrap();
        assert!(appended.starts_with("#!/bin/sh\nmake lint\n"));
        assert!(appended.contains(HOOK_MARKER));

        assert!(hook_script(Some(&fresh), "api", "pd").is_none());
    }

    #[test]
    fn test_quotes_in_ids_and_paths_are_escaped() {
        let script = hook_script(None, "it's", "/opt/my pd/pd").unwrap();
        assert!(script.contains(r"'/opt/my pd/pd' record-commit 'it'\''s' >/dev/null"));
        assert_eq!(shell_quote("$(rm -rf ~)"), "'$(rm -rf ~)'");
    }

    #[test]
    fn test_install_hook_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".git")).unwrap();
        let repo = repo(tmp.path());

        assert_eq!(install_hook(&repo, "pd").unwrap(), HookResult::Installed);
        assert_eq!(install_hook(&repo, "pd").unwrap(), HookResult::AlreadyInstalled);

        let content = std::fs::read_to_string(tmp.path().join(".git/hooks/post-commit")).unwrap();
        assert_eq!(content.matches(HOOK_MARKER).count(), 1);
    }

    #[test]
    fn test_install_hook_skips_non_git() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(install_hook(&repo(tmp.path()), "pd").unwrap(), HookResult::NotGit);
    }
}
