//! Auto-freeze daemon.
//!
//! Filesystem activity under each configured repository resets that repo's
//! idle clock. On every tick, repos idle past the inactivity limit that are
//! neither frozen nor already being frozen get one spawned freeze task. Each
//! task opens its own snapshot store and reports back over a channel; the
//! scheduler never waits on a freeze.

use crate::config::{PrimeConfig, RepoConfig};
use crate::detect::detect_current_repo;
use crate::error::{Error, Result};
use crate::freeze::SourceFreezer;
use crate::storage::SqliteStorage;

use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Scheduler settings.
#[derive(Debug, Clone, Copy)]
pub struct DaemonOptions {
    pub interval: Duration,
    pub inactivity_limit: Duration,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            inactivity_limit: Duration::from_secs(30 * 60),
        }
    }
}

/// Debounce state for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepoActivity {
    pub last_activity: Instant,
    /// A snapshot covers everything up to `last_activity`.
    pub frozen: bool,
    /// When the running freeze was dispatched, if any.
    pub in_flight: Option<Instant>,
}

/// Per-repo activity bookkeeping, independent of the event loop.
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    repos: BTreeMap<String, RepoActivity>,
}

impl ActivityTracker {
    /// Start every repo as active at `now`, so nothing freezes before a full
    /// idle period has passed.
    #[must_use]
    pub fn new<'a>(repo_ids: impl IntoIterator<Item = &'a String>, now: Instant) -> Self {
        let repos = repo_ids
            .into_iter()
            .map(|id| {
                (
                    id.clone(),
                    RepoActivity {
                        last_activity: now,
                        frozen: false,
                        in_flight: None,
                    },
                )
            })
            .collect();
        Self { repos }
    }

    #[must_use]
    pub fn get(&self, repo_id: &str) -> Option<&RepoActivity> {
        self.repos.get(repo_id)
    }

    /// New activity: restart the idle clock and clear `frozen`.
    pub fn record_activity(&mut self, repo_id: &str, now: Instant) {
        if let Some(state) = self.repos.get_mut(repo_id) {
            state.last_activity = now;
            state.frozen = false;
        }
    }

    /// Repos due for a freeze at `now`.
    #[must_use]
    pub fn due(&self, now: Instant, inactivity_limit: Duration) -> Vec<String> {
        self.repos
            .iter()
            .filter(|(_, s)| {
                !s.frozen
                    && s.in_flight.is_none()
                    && now.saturating_duration_since(s.last_activity) > inactivity_limit
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn mark_in_flight(&mut self, repo_id: &str, now: Instant) {
        if let Some(state) = self.repos.get_mut(repo_id) {
            state.in_flight = Some(now);
        }
    }

    /// A freeze finished. Success marks the repo frozen unless activity
    /// arrived after the freeze was dispatched.
    pub fn complete(&mut self, repo_id: &str, success: bool) {
        if let Some(state) = self.repos.get_mut(repo_id) {
            let dispatched = state.in_flight.take();
            state.frozen = success && dispatched.is_some_and(|at| state.last_activity <= at);
        }
    }
}

/// Result of one spawned freeze.
#[derive(Debug)]
pub struct FreezeCompletion {
    pub repo_id: String,
    pub result: std::result::Result<i64, String>,
}

/// Repos touched by a filesystem event. Changes under `.git` are ignored.
#[must_use]
pub fn repos_for_event(event: &notify::Event, repos: &BTreeMap<String, RepoConfig>) -> Vec<String> {
    if matches!(event.kind, EventKind::Access(_)) {
        return Vec::new();
    }
    let mut touched: Vec<String> = event
        .paths
        .iter()
        .filter(|p| p.is_absolute() && !inside_git_dir(p))
        .filter_map(|p| detect_current_repo(p, repos))
        .map(str::to_string)
        .collect();
    touched.sort();
    touched.dedup();
    touched
}

fn inside_git_dir(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
}

/// Freeze `repo` against a fresh store at `db_path`.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the snapshot not saved.
pub async fn freeze_with_own_store<F: SourceFreezer>(
    freezer: &F,
    db_path: &Path,
    repo: &RepoConfig,
) -> Result<i64> {
    let mut storage = SqliteStorage::open(db_path)?;
    let id = freezer.freeze_source(&mut storage, repo).await?;
    storage.close()?;
    Ok(id)
}

/// Run until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the filesystem watcher cannot be created.
pub async fn run<F: SourceFreezer + 'static>(
    config: PrimeConfig,
    db_path: PathBuf,
    freezer: Arc<F>,
    options: DaemonOptions,
) -> Result<()> {
    let (fs_tx, mut fs_rx) = mpsc::unbounded_channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = fs_tx.send(res);
    })
    .map_err(|e| Error::Other(format!("Could not start file watcher: {e}")))?;

    let mut watched = Vec::new();
    for repo in config.repos.values() {
        if !repo.path.exists() {
            tracing::warn!(
                repo = %repo.id,
                path = %repo.path.display(),
                "Skipping: path not found"
            );
            continue;
        }
        match watcher.watch(&repo.path, RecursiveMode::Recursive) {
            Ok(()) => {
                tracing::info!(repo = %repo.id, path = %repo.path.display(), "Monitoring");
                watched.push(repo.id.clone());
            }
            Err(e) => tracing::warn!(repo = %repo.id, error = %e, "Cannot watch repository"),
        }
    }

    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<FreezeCompletion>();
    let mut tracker = ActivityTracker::new(&watched, Instant::now());
    let mut ticker = tokio::time::interval(options.interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!(
        repos = watched.len(),
        interval_secs = options.interval.as_secs(),
        inactivity_secs = options.inactivity_limit.as_secs(),
        "Daemon started"
    );

    loop {
        tokio::select! {
            Some(res) = fs_rx.recv() => match res {
                Ok(event) => {
                    let now = Instant::now();
                    for id in repos_for_event(&event, &config.repos) {
                        tracing::trace!(repo = %id, "Activity");
                        tracker.record_activity(&id, now);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Watcher error"),
            },
            Some(done) = done_rx.recv() => {
                match &done.result {
                    Ok(id) => {
                        tracing::info!(
                            repo = %done.repo_id,
                            snapshot_id = id,
                            "Auto-freeze complete"
                        );
                    }
                    Err(e) => {
                        tracing::error!(repo = %done.repo_id, error = %e, "Auto-freeze failed");
                    }
                }
                tracker.complete(&done.repo_id, done.result.is_ok());
            },
            _ = ticker.tick() => {
                let now = Instant::now();
                for id in tracker.due(now, options.inactivity_limit) {
                    let Some(repo) = config.repos.get(&id).cloned() else {
                        continue;
                    };
                    tracker.mark_in_flight(&id, now);
                    tracing::info!(repo = %id, "Inactive; auto-freezing");

                    let freezer = Arc::clone(&freezer);
                    let db_path = db_path.clone();
                    let done_tx = done_tx.clone();
                    tokio::spawn(async move {
                        let result = freeze_with_own_store(freezer.as_ref(), &db_path, &repo)
                            .await
                            .map_err(|e| e.to_string());
                        let _ = done_tx.send(FreezeCompletion { repo_id: repo.id, result });
                    });
                }
            },
            _ = &mut shutdown => {
                tracing::info!("Shutting down daemon");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, SystemConfig};
    use crate::freeze::FreezeService;

    const LIMIT: Duration = Duration::from_secs(60);

    fn ids() -> Vec<String> {
        vec!["api".to_string(), "web".to_string()]
    }

    #[test]
    fn test_nothing_due_before_limit() {
        let start = Instant::now();
        let tracker = ActivityTracker::new(&ids(), start);
        assert!(tracker.due(start + LIMIT, LIMIT).is_empty());
        assert_eq!(tracker.due(start + LIMIT * 2, LIMIT), ids());
    }

    #[test]
    fn test_in_flight_is_not_dispatched_twice() {
        let start = Instant::now();
        let mut tracker = ActivityTracker::new(&ids(), start);
        let later = start + LIMIT * 2;

        tracker.mark_in_flight("api", later);
        assert_eq!(tracker.due(later, LIMIT), vec!["web"]);
    }

    #[test]
    fn test_success_freezes_until_new_activity() {
        let start = Instant::now();
        let mut tracker = ActivityTracker::new(&ids(), start);
        let later = start + LIMIT * 2;

        tracker.mark_in_flight("api", later);
        tracker.complete("api", true);
        assert!(tracker.get("api").unwrap().frozen);
        assert!(!tracker.due(later + LIMIT * 5, LIMIT).contains(&"api".to_string()));

        tracker.record_activity("api", later + LIMIT);
        assert!(!tracker.get("api").unwrap().frozen);
        assert!(tracker.due(later + LIMIT * 3, LIMIT).contains(&"api".to_string()));
    }

    #[test]
    fn test_failure_allows_retry() {
        let start = Instant::now();
        let mut tracker = ActivityTracker::new(&ids(), start);
        let later = start + LIMIT * 2;

        tracker.mark_in_flight("web", later);
        tracker.complete("web", false);
        let state = tracker.get("web").unwrap();
        assert!(!state.frozen);
        assert!(state.in_flight.is_none());
        assert!(tracker.due(later, LIMIT).contains(&"web".to_string()));
    }

    #[test]
    fn test_activity_during_freeze_keeps_repo_unfrozen() {
        let start = Instant::now();
        let mut tracker = ActivityTracker::new(&ids(), start);
        let dispatched = start + LIMIT * 2;

        tracker.mark_in_flight("api", dispatched);
        tracker.record_activity("api", dispatched + Duration::from_secs(1));
        tracker.complete("api", true);
        assert!(!tracker.get("api").unwrap().frozen);
    }

    #[test]
    fn test_repos_for_event_ignores_git_dir() {
        let config = parse_config(
            "repos:\n  api:\n    path: /srv/api\n  web:\n    path: /srv/web\n",
            Path::new("/"),
        )
        .unwrap();

        let event = notify::Event::new(EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("/srv/api/src/main.rs"))
            .add_path(PathBuf::from("/srv/api/lib.rs"))
            .add_path(PathBuf::from("/srv/web/.git/index"))
            .add_path(PathBuf::from("/home/me/notes.txt"));
        assert_eq!(repos_for_event(&event, &config.repos), vec!["api"]);

        let access = notify::Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/srv/web/index.html"));
        assert!(repos_for_event(&access, &config.repos).is_empty());
    }

    #[tokio::test]
    async fn test_freeze_with_own_store_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("data").join("prime.db");
        let repo = RepoConfig {
            id: "api".to_string(),
            path: tmp.path().to_path_buf(),
            priority: 1,
            active_branch: "main".to_string(),
        };
        let service = FreezeService::from_config(
            &SystemConfig {
                mock_mode: true,
                ..SystemConfig::default()
            },
            None,
        );

        let id = freeze_with_own_store(&service, &db, &repo).await.unwrap();

        let storage = SqliteStorage::open(&db).unwrap();
        assert_eq!(storage.latest_snapshot("api").unwrap().unwrap().id, id);
    }
}
