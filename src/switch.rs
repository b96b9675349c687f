//! Switch orchestrator.
//!
//! ```text
//! IDLE ─► DETECTING ─► FREEZING_SOURCE? ─► ACTIVATING_TARGET ─► REPORTING ─► DONE
//! ```
//!
//! Sub-step failures are recorded on the [`SwitchReport`] and never stop the
//! run: losing the outgoing snapshot must not block entering the target.
//! The storage handle is owned by the run and released when it ends.

use crate::config::{PrimeConfig, RepoConfig};
use crate::detect::detect_current_repo;
use crate::error::Result;
use crate::freeze::SourceFreezer;
use crate::model::ContextSnapshot;
use crate::storage::{EventType, SqliteStorage};
use crate::workspace::{SessionStatus, Workspace};

use serde::Serialize;
use std::path::PathBuf;

/// Orchestrator states, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchPhase {
    Idle,
    Detecting,
    FreezingSource,
    ActivatingTarget,
    Reporting,
    Done,
}

/// Per-invocation inputs.
#[derive(Debug, Clone)]
pub struct SwitchOptions {
    pub cwd: PathBuf,
    pub mock: bool,
    /// The caller already runs inside tmux.
    pub inside_multiplexer: bool,
}

/// Everything that happened during a switch.
#[derive(Debug, Clone, Serialize)]
pub struct SwitchReport {
    pub target: String,
    pub detected: Option<String>,
    pub frozen_snapshot_id: Option<i64>,
    pub freeze_error: Option<String>,
    pub session_created: Option<bool>,
    pub session_error: Option<String>,
    pub editor_error: Option<String>,
    pub event_error: Option<String>,
    pub snapshot_error: Option<String>,
    pub last_snapshot: Option<ContextSnapshot>,
    pub phases: Vec<SwitchPhase>,
    /// The caller must attach the target session itself.
    pub must_attach: bool,
}

impl SwitchReport {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            detected: None,
            frozen_snapshot_id: None,
            freeze_error: None,
            session_created: None,
            session_error: None,
            editor_error: None,
            event_error: None,
            snapshot_error: None,
            last_snapshot: None,
            phases: vec![SwitchPhase::Idle],
            must_attach: false,
        }
    }

    fn enter(&mut self, phase: SwitchPhase) {
        tracing::debug!(?phase, target = %self.target, "Switch phase");
        self.phases.push(phase);
    }
}

/// Drives one switch with injected freeze and workspace collaborators.
pub struct SwitchOrchestrator<'a, F, W> {
    config: &'a PrimeConfig,
    freezer: &'a F,
    workspace: &'a W,
}

impl<'a, F: SourceFreezer, W: Workspace> SwitchOrchestrator<'a, F, W> {
    #[must_use]
    pub fn new(config: &'a PrimeConfig, freezer: &'a F, workspace: &'a W) -> Self {
        Self {
            config,
            freezer,
            workspace,
        }
    }

    /// Switch to `target_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepoNotFound` before any work if the target is not
    /// configured. Every later failure is recorded on the report instead.
    pub async fn run(
        &self,
        target_id: &str,
        mut storage: SqliteStorage,
        options: &SwitchOptions,
    ) -> Result<SwitchReport> {
        let target = self.config.repo(target_id)?;
        let mut report = SwitchReport::new(target_id);

        report.enter(SwitchPhase::Detecting);
        report.detected = std::path::absolute(&options.cwd)
            .ok()
            .and_then(|cwd| detect_current_repo(&cwd, &self.config.repos))
            .map(str::to_string);

        if let Some(source) = self.source_to_freeze(report.detected.as_deref(), target_id) {
            report.enter(SwitchPhase::FreezingSource);
            tracing::info!(repo = %source.id, "Auto-freezing current repo");
            match self.freezer.freeze_source(&mut storage, source).await {
                Ok(id) => report.frozen_snapshot_id = Some(id),
                Err(e) => {
                    tracing::error!(repo = %source.id, error = %e, "Failed to freeze current repo");
                    report.freeze_error = Some(e.to_string());
                }
            }
        }

        report.enter(SwitchPhase::ActivatingTarget);
        tracing::info!(repo = %target.id, "Switching to target");
        self.activate(target, options.mock, &mut report).await;

        report.enter(SwitchPhase::Reporting);
        if let Err(e) = storage.record_event(&target.id, EventType::SwitchIn) {
            tracing::error!(repo = %target.id, error = %e, "Failed to record SWITCH_IN");
            report.event_error = Some(e.to_string());
        }
        match storage.latest_snapshot(&target.id) {
            Ok(snapshot) => report.last_snapshot = snapshot,
            Err(e) => report.snapshot_error = Some(e.to_string()),
        }

        if let Err(e) = storage.close() {
            tracing::warn!(error = %e, "Failed to close snapshot store");
        }

        report.must_attach = !options.mock && !options.inside_multiplexer;
        report.enter(SwitchPhase::Done);
        Ok(report)
    }

    fn source_to_freeze(&self, detected: Option<&str>, target_id: &str) -> Option<&'a RepoConfig> {
        let config: &'a PrimeConfig = self.config;
        detected
            .filter(|id| *id != target_id)
            .and_then(|id| config.repos.get(id))
    }

    async fn activate(&self, target: &RepoConfig, mock: bool, report: &mut SwitchReport) {
        if mock {
            tracing::info!("MOCK MODE: ensure_session({})", target.id);
            tracing::info!("MOCK MODE: launch_editor({})", target.path.display());
            return;
        }

        match self.workspace.ensure_session(&target.id, &target.path).await {
            Ok(status) => report.session_created = Some(status == SessionStatus::Created),
            Err(e) => {
                tracing::warn!(repo = %target.id, error = %e, "Could not ensure session");
                report.session_error = Some(e.to_string());
            }
        }

        let system = &self.config.system;
        if let Err(e) = self
            .workspace
            .launch_editor(&target.path, &system.editor_cmd, &system.editor_args)
        {
            tracing::warn!(repo = %target.id, error = %e, "Could not launch editor");
            report.editor_error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::error::Error;
    use crate::model::{HumanContext, NewSnapshot};
    use crate::workspace::WorkspaceError;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFreezer {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl SourceFreezer for RecordingFreezer {
        async fn freeze_source(
            &self,
            _storage: &mut SqliteStorage,
            repo: &RepoConfig,
        ) -> Result<i64> {
            self.calls.lock().unwrap().push(repo.id.clone());
            if self.fail {
                Err(Error::Other("disk full".to_string()))
            } else {
                Ok(41)
            }
        }
    }

    #[derive(Default)]
    struct RecordingWorkspace {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl Workspace for RecordingWorkspace {
        async fn ensure_session(
            &self,
            repo_id: &str,
            _path: &Path,
        ) -> std::result::Result<SessionStatus, WorkspaceError> {
            self.calls.lock().unwrap().push(format!("session:{repo_id}"));
            if self.fail {
                Err(WorkspaceError::NotInstalled("tmux".to_string()))
            } else {
                Ok(SessionStatus::Created)
            }
        }

        fn launch_editor(
            &self,
            path: &Path,
            editor_cmd: &str,
            _args: &[String],
        ) -> std::result::Result<(), WorkspaceError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("editor:{editor_cmd}:{}", path.display()));
            if self.fail {
                Err(WorkspaceError::NotInstalled(editor_cmd.to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn config() -> PrimeConfig {
        parse_config(
            "system:\n  editor_cmd: code\nrepos:\n  A:\n    path: /tmp/A\n  B:\n    path: /tmp/B\n",
            Path::new("/"),
        )
        .unwrap()
    }

    fn options(cwd: &str) -> SwitchOptions {
        SwitchOptions {
            cwd: PathBuf::from(cwd),
            mock: false,
            inside_multiplexer: true,
        }
    }

    fn shared_db() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("prime.db");
        (tmp, path)
    }

    #[tokio::test]
    async fn test_end_to_end_switch_from_a_to_b() {
        let config = config();
        let freezer = RecordingFreezer::default();
        let workspace = RecordingWorkspace::default();
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);

        let report = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &options("/tmp/A/src"))
            .await
            .unwrap();

        assert_eq!(report.detected.as_deref(), Some("A"));
        assert_eq!(*freezer.calls.lock().unwrap(), vec!["A"]);
        assert_eq!(
            *workspace.calls.lock().unwrap(),
            vec!["session:B", "editor:code:/tmp/B"]
        );
        assert_eq!(report.frozen_snapshot_id, Some(41));
        assert!(report.last_snapshot.is_none());
        assert_eq!(
            report.phases,
            vec![
                SwitchPhase::Idle,
                SwitchPhase::Detecting,
                SwitchPhase::FreezingSource,
                SwitchPhase::ActivatingTarget,
                SwitchPhase::Reporting,
                SwitchPhase::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_relative_cwd_is_resolved_against_current_dir() {
        let here = std::env::current_dir().unwrap();
        let yaml = format!(
            "repos:\n  here:\n    path: {}\n  B:\n    path: /tmp/B\n",
            here.display()
        );
        let config = parse_config(&yaml, Path::new("/")).unwrap();
        let freezer = RecordingFreezer::default();
        let workspace = RecordingWorkspace::default();
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);

        let report = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &options("src"))
            .await
            .unwrap();

        assert_eq!(report.detected.as_deref(), Some("here"));
        assert_eq!(*freezer.calls.lock().unwrap(), vec!["here"]);
    }

    #[tokio::test]
    async fn test_freeze_failure_does_not_block_target() {
        let config = config();
        let freezer = RecordingFreezer {
            fail: true,
            ..RecordingFreezer::default()
        };
        let workspace = RecordingWorkspace::default();
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);

        let report = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &options("/tmp/A"))
            .await
            .unwrap();

        assert_eq!(report.freeze_error.as_deref(), Some("disk full"));
        assert_eq!(workspace.calls.lock().unwrap().len(), 2);
        assert!(report.phases.contains(&SwitchPhase::Reporting));
        assert_eq!(report.phases.last(), Some(&SwitchPhase::Done));
    }

    #[tokio::test]
    async fn test_no_freeze_when_already_in_target_or_outside() {
        let config = config();
        let freezer = RecordingFreezer::default();
        let workspace = RecordingWorkspace::default();
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);

        let same = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &options("/tmp/B/x"))
            .await
            .unwrap();
        let outside = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &options("/home/me"))
            .await
            .unwrap();

        assert!(freezer.calls.lock().unwrap().is_empty());
        assert!(!same.phases.contains(&SwitchPhase::FreezingSource));
        assert!(outside.detected.is_none());
    }

    #[tokio::test]
    async fn test_mock_mode_skips_workspace() {
        let config = config();
        let freezer = RecordingFreezer::default();
        let workspace = RecordingWorkspace::default();
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);
        let mut opts = options("/tmp/A");
        opts.mock = true;
        opts.inside_multiplexer = false;

        let report = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &opts)
            .await
            .unwrap();

        assert!(workspace.calls.lock().unwrap().is_empty());
        assert!(!report.must_attach);
    }

    #[tokio::test]
    async fn test_must_attach_outside_tmux() {
        let config = config();
        let freezer = RecordingFreezer::default();
        let workspace = RecordingWorkspace::default();
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);
        let mut opts = options("/home/me");
        opts.inside_multiplexer = false;

        let report = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &opts)
            .await
            .unwrap();
        assert!(report.must_attach);

        opts.inside_multiplexer = true;
        let report = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &opts)
            .await
            .unwrap();
        assert!(!report.must_attach);
    }

    #[tokio::test]
    async fn test_workspace_failures_are_reported() {
        let config = config();
        let freezer = RecordingFreezer::default();
        let workspace = RecordingWorkspace {
            fail: true,
            ..RecordingWorkspace::default()
        };
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);

        let report = orchestrator
            .run("B", SqliteStorage::open_memory().unwrap(), &options("/home/me"))
            .await
            .unwrap();

        assert_eq!(report.session_error.as_deref(), Some("tmux is not installed"));
        assert_eq!(report.editor_error.as_deref(), Some("code is not installed"));
        assert_eq!(report.phases.last(), Some(&SwitchPhase::Done));
    }

    #[tokio::test]
    async fn test_unknown_target_fails_before_work() {
        let config = config();
        let freezer = RecordingFreezer::default();
        let workspace = RecordingWorkspace::default();
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);

        let err = orchestrator
            .run("Z", SqliteStorage::open_memory().unwrap(), &options("/tmp/A"))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 1);
        assert!(freezer.calls.lock().unwrap().is_empty());
        assert!(workspace.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_switch_keeps_latest_snapshot() {
        let config = config();
        let freezer = RecordingFreezer::default();
        let workspace = RecordingWorkspace::default();
        let orchestrator = SwitchOrchestrator::new(&config, &freezer, &workspace);
        let (_tmp, db) = shared_db();

        let mut storage = SqliteStorage::open(&db).unwrap();
        let target = config.repo("B").unwrap();
        for (ts, text) in [(100, "older"), (200, "newest")] {
            storage
                .save_snapshot(
                    target,
                    &NewSnapshot {
                        repo_id: "B".into(),
                        timestamp: ts,
                        git_status_summary: String::new(),
                        terminal_last_command: String::new(),
                        terminal_output_summary: String::new(),
                        ai_sitrep: text.into(),
                        sitrep_failed: false,
                        human: HumanContext::default(),
                    },
                )
                .unwrap();
        }
        storage.close().unwrap();

        let first = orchestrator
            .run("B", SqliteStorage::open(&db).unwrap(), &options("/tmp/B"))
            .await
            .unwrap();
        let second = orchestrator
            .run("B", SqliteStorage::open(&db).unwrap(), &options("/tmp/B"))
            .await
            .unwrap();

        assert_eq!(first.last_snapshot.unwrap().ai_sitrep, "newest");
        assert_eq!(second.last_snapshot.unwrap().ai_sitrep, "newest");

        let storage = SqliteStorage::open(&db).unwrap();
        let switch_ins = storage
            .events_for_repo("B")
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == EventType::SwitchIn)
            .count();
        assert_eq!(switch_ins, 2);
    }
}
