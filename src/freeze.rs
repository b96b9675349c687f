//! Freeze: capture a repository's context and persist it as a snapshot.
//!
//! Git status and terminal capture run concurrently; each degrades to a
//! placeholder on failure. The SITREP step never fails either, so a freeze
//! only errors when the snapshot cannot be written.

use crate::capture::{
    capture_terminal_state, get_active_task, get_status, ActiveTask, TerminalState,
};
use crate::config::{RepoConfig, SystemConfig};
use crate::error::Result;
use crate::model::{now_millis, HumanContext, NewSnapshot};
use crate::sitrep::{SitrepFailureKind, SitrepGenerator, SitrepOutcome, SitrepRequest};
use crate::storage::SqliteStorage;

use serde::Serialize;
use std::future::Future;

pub const MOCK_GIT_SUMMARY: &str = "MOCK: Branch: main\nDirty: no";
pub const MOCK_LAST_COMMAND: &str = "mock_cmd";
pub const MOCK_TERMINAL_OUTPUT: &str = "MOCK: Terminal output";
pub const MOCK_SITREP: &str = "MOCK: SITREP generated without AI.";

/// What a freeze captured and stored.
#[derive(Debug, Clone, Serialize)]
pub struct FreezeReport {
    pub snapshot_id: i64,
    pub repo_id: String,
    pub git_summary: String,
    pub terminal: TerminalState,
    pub active_task: Option<ActiveTask>,
    pub sitrep: SitrepOutcome,
    pub human: HumanContext,
}

/// Runs freezes against a configured generator.
#[derive(Debug, Clone)]
pub struct FreezeService {
    generator: SitrepGenerator,
    mock: bool,
}

impl FreezeService {
    #[must_use]
    pub fn new(generator: SitrepGenerator, mock: bool) -> Self {
        Self { generator, mock }
    }

    #[must_use]
    pub fn from_config(system: &SystemConfig, openai_api_key: Option<String>) -> Self {
        Self::new(
            SitrepGenerator::from_config(system, openai_api_key),
            system.mock_mode,
        )
    }

    /// Capture, summarize and persist one snapshot for `repo`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the snapshot cannot be saved.
    pub async fn freeze(
        &self,
        storage: &mut SqliteStorage,
        repo: &RepoConfig,
        human: HumanContext,
    ) -> Result<FreezeReport> {
        tracing::info!(repo = %repo.id, path = %repo.path.display(), "Freezing context");

        let (git_summary, terminal) = if self.mock {
            tracing::info!("MOCK MODE: skipping git status and terminal capture");
            (
                MOCK_GIT_SUMMARY.to_string(),
                TerminalState {
                    last_command: MOCK_LAST_COMMAND.to_string(),
                    output_summary: MOCK_TERMINAL_OUTPUT.to_string(),
                },
            )
        } else {
            let (git, terminal) = tokio::join!(
                get_status(&repo.path),
                capture_terminal_state(Some(&repo.id))
            );
            (git.summary(), terminal)
        };
        tracing::debug!(
            repo = %repo.id,
            last_command = %terminal.last_command,
            "Captured machine state"
        );

        let active_task = get_active_task(&repo.path);

        let sitrep = if self.mock {
            tracing::info!("MOCK MODE: skipping AI generation");
            SitrepOutcome::Generated {
                text: MOCK_SITREP.to_string(),
                provider: "mock",
                model: "none".to_string(),
            }
        } else {
            let request = SitrepRequest {
                repo_id: &repo.id,
                git_state: &git_summary,
                terminal_logs: &terminal.output_summary,
                active_task: active_task.as_ref(),
                human: &human,
            };
            self.generator.generate(&request, storage).await
        };

        match &sitrep {
            SitrepOutcome::Failed {
                kind: SitrepFailureKind::ConfirmationRequired,
                detail,
            } => tracing::info!(repo = %repo.id, %detail, "SITREP skipped"),
            SitrepOutcome::Failed { kind, detail } => {
                tracing::warn!(repo = %repo.id, ?kind, %detail, "SITREP generation failed");
            }
            SitrepOutcome::Generated { .. } => {}
        }

        let snapshot = NewSnapshot {
            repo_id: repo.id.clone(),
            timestamp: now_millis(),
            git_status_summary: git_summary.clone(),
            terminal_last_command: terminal.last_command.clone(),
            terminal_output_summary: terminal.output_summary.clone(),
            ai_sitrep: sitrep.display_text(),
            sitrep_failed: sitrep.is_failure(),
            human: human.clone(),
        };
        let snapshot_id = storage.save_snapshot(repo, &snapshot)?;
        tracing::info!(repo = %repo.id, snapshot_id, "Snapshot saved");

        Ok(FreezeReport {
            snapshot_id,
            repo_id: repo.id.clone(),
            git_summary,
            terminal,
            active_task,
            sitrep,
            human,
        })
    }
}

/// The freeze step as seen by the switch orchestrator.
pub trait SourceFreezer: Send + Sync {
    /// Freeze `repo` without human input. Returns the snapshot id.
    fn freeze_source(
        &self,
        storage: &mut SqliteStorage,
        repo: &RepoConfig,
    ) -> impl Future<Output = Result<i64>> + Send;
}

impl SourceFreezer for FreezeService {
    async fn freeze_source(&self, storage: &mut SqliteStorage, repo: &RepoConfig) -> Result<i64> {
        self.freeze(storage, repo, HumanContext::default())
            .await
            .map(|report| report.snapshot_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::EventType;
    use std::path::PathBuf;

    fn repo(path: PathBuf) -> RepoConfig {
        RepoConfig {
            id: "api".to_string(),
            path,
            priority: 5,
            active_branch: "main".to_string(),
        }
    }

    fn mock_service() -> FreezeService {
        FreezeService::from_config(
            &SystemConfig {
                mock_mode: true,
                ..SystemConfig::default()
            },
            None,
        )
    }

    #[tokio::test]
    async fn test_mock_freeze_persists_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human =
            HumanContext::new(None, Some("CI red".into()), None, Some("auth refactor".into()));

        let report = mock_service()
            .freeze(&mut storage, &repo(tmp.path().to_path_buf()), human)
            .await
            .unwrap();
        assert_eq!(report.git_summary, MOCK_GIT_SUMMARY);

        let latest = storage.latest_snapshot("api").unwrap().unwrap();
        assert_eq!(latest.id, report.snapshot_id);
        assert_eq!(latest.ai_sitrep, MOCK_SITREP);
        assert_eq!(latest.terminal_last_command, MOCK_LAST_COMMAND);
        assert_eq!(latest.human.blocker.as_deref(), Some("CI red"));
        assert!(!latest.sitrep_failed);

        let events = storage.events_for_repo("api").unwrap();
        assert_eq!(events[0].event_type, EventType::Freeze);
    }

    #[tokio::test]
    async fn test_each_freeze_adds_one_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let service = mock_service();
        let repo = repo(tmp.path().to_path_buf());

        service.freeze_source(&mut storage, &repo).await.unwrap();
        service.freeze_source(&mut storage, &repo).await.unwrap();
        assert_eq!(storage.list_snapshots("api", 10).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ai_failure_still_saves_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let system = SystemConfig {
            ollama_api_url: "http://127.0.0.1:9/api/generate".to_string(),
            ollama_max_retries: 0,
            ollama_timeout_seconds: 1.0,
            ..SystemConfig::default()
        };
        let service = FreezeService::from_config(&system, None);

        let report = service
            .freeze(&mut storage, &repo(tmp.path().to_path_buf()), HumanContext::default())
            .await
            .unwrap();
        assert!(report.sitrep.is_failure());

        let latest = storage.latest_snapshot("api").unwrap().unwrap();
        assert!(latest.sitrep_failed);
        assert!(latest.ai_sitrep.starts_with("Error generating SITREP: "));
        assert_eq!(latest.git_status_summary, report.git_summary);
    }
}
