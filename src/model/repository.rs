//! Repository record as stored in the snapshot database.

use crate::config::RepoConfig;
use serde::{Deserialize, Serialize};

/// A repository row.
///
/// Created lazily the first time a snapshot is saved for a configured repo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub path: String,
    /// Higher is more urgent.
    pub priority: i64,
    pub active_branch: Option<String>,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Repository {
    /// Build the row for a configured repository.
    #[must_use]
    pub fn from_config(repo: &RepoConfig, now: i64) -> Self {
        Self {
            id: repo.id.clone(),
            path: repo.path.to_string_lossy().into_owned(),
            priority: repo.priority,
            active_branch: Some(repo.active_branch.clone()),
            created_at: now,
        }
    }
}
