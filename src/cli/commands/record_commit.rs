//! Record-commit command implementation (invoked by the post-commit hook).

use super::AppContext;
use crate::error::Result;
use crate::storage::EventType;

/// Append a `COMMIT` event for `repo_id`.
///
/// # Errors
///
/// Returns `RepoNotFound` for an unknown id or a storage error.
pub fn execute(ctx: &AppContext, repo_id: &str) -> Result<()> {
    ctx.config.repo(repo_id)?;
    let mut storage = ctx.open_storage()?;
    storage.record_event(repo_id, EventType::Commit)?;
    storage.close()?;
    tracing::debug!(repo = %repo_id, "Recorded commit");
    Ok(())
}
