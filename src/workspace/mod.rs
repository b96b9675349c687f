//! Session and editor boundary.
//!
//! [`Workspace`] is the seam the switch orchestrator drives; [`TmuxWorkspace`]
//! is the real implementation. Every failure comes back as a
//! [`WorkspaceError`] to report, never a panic or an abort.
//!
//! Attaching a terminal to the session is not done here: it needs the
//! caller's controlling terminal, so `pd switch` hands the session name to
//! the shell wrapper (see [`attach`]).

pub mod attach;
pub mod editor;
pub mod tmux;

pub use tmux::{session_name, SessionStatus, TmuxWorkspace};

use crate::capture::CommandError;

use std::future::Future;
use std::path::Path;
use thiserror::Error;

/// Failure of a session or editor action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("{0}")]
    Failed(String),
}

impl From<CommandError> for WorkspaceError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::NotFound(program) => Self::NotInstalled(program),
            CommandError::Timeout(program) => Self::Timeout(program),
            other @ CommandError::Failed { .. } => Self::Failed(other.to_string()),
        }
    }
}

/// Terminal session + editor actions for a repository.
pub trait Workspace: Send + Sync {
    /// Create the repository's session if absent. Never destroys one.
    fn ensure_session(
        &self,
        repo_id: &str,
        path: &Path,
    ) -> impl Future<Output = Result<SessionStatus, WorkspaceError>> + Send;

    /// Open the editor on `path`. Fire-and-forget.
    fn launch_editor(
        &self,
        path: &Path,
        editor_cmd: &str,
        editor_args: &[String],
    ) -> Result<(), WorkspaceError>;
}
