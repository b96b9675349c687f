//! Machine-context collectors used by a freeze.
//!
//! - [`git`] - branch, dirty files, diff stat
//! - [`terminal`] - tmux pane capture + last command
//! - [`tasks`] - active Task Master task
//!
//! Collectors never fail: every error path degrades to placeholder values
//! so a freeze can always persist its snapshot.

pub mod git;
pub mod tasks;
pub mod terminal;

pub use git::{get_status, GitStatus};
pub use tasks::{get_active_task, ActiveTask};
pub use terminal::{capture_terminal_state, TerminalState};

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;

/// Why an external command produced no usable output.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0} not installed")]
    NotFound(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("{program} failed: {message}")]
    Failed { program: String, message: String },
}

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run `program args...` with a hard timeout. The child is killed if the
/// timeout fires.
///
/// # Errors
///
/// Returns `NotFound` when the binary is missing, `Timeout` when the deadline
/// passes, and `Failed` for any other spawn or wait error.
pub async fn run_command(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|e| spawn_error(program, &e))?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => Err(CommandError::Timeout(program.to_string())),
        Ok(Err(e)) => Err(CommandError::Failed {
            program: program.to_string(),
            message: e.to_string(),
        }),
        Ok(Ok(output)) => Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
    }
}

fn spawn_error(program: &str, e: &std::io::Error) -> CommandError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CommandError::NotFound(program.to_string())
    } else {
        CommandError::Failed {
            program: program.to_string(),
            message: e.to_string(),
        }
    }
}

/// Whether `program` can be found on `PATH`.
#[must_use]
pub fn binary_on_path(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let err = run_command("pd-definitely-missing-binary", &[], None, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
        assert_eq!(err.to_string(), "pd-definitely-missing-binary not installed");
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let out = run_command("sh", &["-c", "echo hello"], None, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let err = run_command("sh", &["-c", "sleep 5"], None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout(_)));
    }

    #[test]
    fn test_binary_on_path() {
        assert!(binary_on_path("sh"));
        assert!(!binary_on_path("pd-definitely-missing-binary"));
    }
}
