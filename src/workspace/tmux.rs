//! tmux session management.

use super::{editor, Workspace, WorkspaceError};
use crate::capture::{binary_on_path, run_command};

use std::path::Path;
use std::time::Duration;

const QUERY_TIMEOUT: Duration = Duration::from_secs(2);
const CREATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Session name for a repository.
#[must_use]
pub fn session_name(repo_id: &str) -> String {
    format!("pd-{repo_id}")
}

/// What `ensure_session` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Created,
    Existing,
}

/// Real workspace: tmux sessions plus a detached editor process.
#[derive(Debug, Clone)]
pub struct TmuxWorkspace {
    /// Switch the current client after ensuring the session.
    inside_tmux: bool,
    /// Program started in new sessions.
    shell: String,
}

impl TmuxWorkspace {
    #[must_use]
    pub fn new(inside_tmux: bool, shell: String) -> Self {
        Self { inside_tmux, shell }
    }

    /// Read `TMUX` and `SHELL` from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "bash".to_string());
        Self::new(crate::config::inside_tmux(), shell)
    }
}

impl Workspace for TmuxWorkspace {
    async fn ensure_session(
        &self,
        repo_id: &str,
        path: &Path,
    ) -> Result<SessionStatus, WorkspaceError> {
        if !binary_on_path("tmux") {
            return Err(WorkspaceError::NotInstalled("tmux".to_string()));
        }

        let name = session_name(repo_id);
        let existing =
            run_command("tmux", &["has-session", "-t", &name], None, QUERY_TIMEOUT).await?;

        let status = if existing.success {
            SessionStatus::Existing
        } else {
            let dir = path.to_string_lossy();
            let created = run_command(
                "tmux",
                &["new-session", "-d", "-s", &name, "-c", &dir, &self.shell],
                None,
                CREATE_TIMEOUT,
            )
            .await?;
            if !created.success {
                return Err(WorkspaceError::Failed(format!(
                    "tmux new-session failed: {}",
                    created.stderr.trim()
                )));
            }
            tracing::info!(session = %name, path = %path.display(), "Created tmux session");
            SessionStatus::Created
        };

        if self.inside_tmux {
            let switched =
                run_command("tmux", &["switch-client", "-t", &name], None, QUERY_TIMEOUT).await?;
            if !switched.success {
                return Err(WorkspaceError::Failed(format!(
                    "tmux switch-client failed: {}",
                    switched.stderr.trim()
                )));
            }
        }

        Ok(status)
    }

    fn launch_editor(
        &self,
        path: &Path,
        editor_cmd: &str,
        editor_args: &[String],
    ) -> Result<(), WorkspaceError> {
        editor::launch(path, editor_cmd, editor_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_name() {
        assert_eq!(session_name("api"), "pd-api");
    }

    #[test]
    fn test_from_env_has_a_shell() {
        assert!(!TmuxWorkspace::from_env().shell.is_empty());
    }
}
