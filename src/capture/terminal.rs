//! Terminal capture from the repository's tmux session.

use super::{run_command, CommandError};
use crate::workspace::tmux::session_name;

use serde::Serialize;
use std::time::Duration;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(2);

pub const NO_SESSION: &str = "No tmux session found or capture failed.";
pub const TIMED_OUT: &str = "Terminal capture timed out.";
pub const NOT_INSTALLED: &str = "tmux not installed.";
pub const UNEXPECTED: &str = "Unexpected error during terminal capture.";

/// Last command and recent output of a pane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalState {
    /// `unknown` when no prompt line was found.
    pub last_command: String,
    pub output_summary: String,
}

impl TerminalState {
    fn placeholder(summary: &str) -> Self {
        Self {
            last_command: "unknown".to_string(),
            output_summary: summary.to_string(),
        }
    }
}

/// Capture the last 50 lines of `pd-<repo_id>` (or the current pane).
///
/// Never fails; missing tmux, timeouts and capture errors map to distinct
/// placeholder summaries.
pub async fn capture_terminal_state(repo_id: Option<&str>) -> TerminalState {
    let target = repo_id.map(session_name);
    let mut args = vec!["capture-pane", "-p", "-S", "-50"];
    if let Some(ref target) = target {
        args.extend(["-t", target.as_str()]);
    }

    match run_command("tmux", &args, None, CAPTURE_TIMEOUT).await {
        Ok(out) if out.success => {
            let output = out.stdout.trim().to_string();
            TerminalState {
                last_command: extract_last_command(&output)
                    .unwrap_or_else(|| "unknown".to_string()),
                output_summary: output,
            }
        }
        Ok(_) => TerminalState::placeholder(NO_SESSION),
        Err(CommandError::Timeout(_)) => TerminalState::placeholder(TIMED_OUT),
        Err(CommandError::NotFound(_)) => TerminalState::placeholder(NOT_INSTALLED),
        Err(e) => {
            tracing::debug!(error = %e, "Terminal capture failed");
            TerminalState::placeholder(UNEXPECTED)
        }
    }
}

/// The command on the last prompt-looking line (`$`, `❯` or `>` followed by
/// whitespace).
#[must_use]
pub fn extract_last_command(output: &str) -> Option<String> {
    output.lines().rev().find_map(|line| {
        let rest = line.trim_start();
        let rest = rest
            .strip_prefix('$')
            .or_else(|| rest.strip_prefix('❯'))
            .or_else(|| rest.strip_prefix('>'))?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let command = rest.trim();
        (!command.is_empty()).then(|| command.to_string())
    })
}
