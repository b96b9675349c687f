//! SQLite storage implementation.
//!
//! The snapshot store for Prime Directive. Every write goes through
//! [`SqliteStorage::mutate`], which wraps the closure in one IMMEDIATE
//! transaction and appends any events the closure recorded before commit.

use crate::config::RepoConfig;
use crate::error::{Error, Result};
use crate::model::{
    ContextSnapshot, HumanContext, NewSnapshot, Repository, UsageEntry, UsageSummary,
};
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::time::Duration;

/// SQLite-based storage backend.
///
/// Dropping the handle closes the connection; [`close`](Self::close) does the
/// same but reports errors.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation, collecting events written at commit time.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, repo_id: &str, event_type: EventType, timestamp: i64) {
        self.events.push(Event::new(repo_id, event_type, timestamp));
    }
}

const SNAPSHOT_COLUMNS: &str = "id, repo_id, timestamp, git_status_summary, terminal_last_command,
     terminal_output_summary, ai_sitrep, sitrep_failed,
     human_objective, human_blocker, human_next_step, human_note";

impl SqliteStorage {
    /// Open a database at the given path, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis))?;

        apply_schema(&conn)?;
        tracing::debug!(path = %path.display(), "Opened snapshot store");
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Release the connection, surfacing any close error.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite refuses to close the connection.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes recorded events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        tracing::trace!(op = %ctx.op_name, events = ctx.events.len(), "Committed mutation");

        Ok(result)
    }

    // ==================
    // Repository Operations
    // ==================

    /// Insert the repository row if it is absent. Never overwrites.
    ///
    /// Returns `true` when a row was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn ensure_repository(&mut self, repo: &RepoConfig) -> Result<bool> {
        let row = Repository::from_config(repo, crate::model::now_millis());
        self.mutate("ensure_repository", |tx, _ctx| ensure_repository_tx(tx, &row))
    }

    /// Get a repository row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
        let repo = self
            .conn
            .query_row(
                "SELECT id, path, priority, active_branch, created_at
                 FROM repositories WHERE id = ?1",
                [id],
                |row| {
                    Ok(Repository {
                        id: row.get(0)?,
                        path: row.get(1)?,
                        priority: row.get(2)?,
                        active_branch: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(repo)
    }

    // ==================
    // Snapshot Operations
    // ==================

    /// Insert a snapshot for an already-registered repository.
    ///
    /// # Errors
    ///
    /// Returns `RepoNotRegistered` if the repository row is absent.
    pub fn insert_snapshot(&mut self, snapshot: &NewSnapshot) -> Result<i64> {
        self.mutate("insert_snapshot", |tx, ctx| {
            let id = insert_snapshot_tx(tx, snapshot)?;
            ctx.record_event(&snapshot.repo_id, EventType::Freeze, snapshot.timestamp);
            Ok(id)
        })
    }

    /// Ensure the repository row exists, then insert the snapshot, as one
    /// atomic unit.
    ///
    /// # Errors
    ///
    /// Returns an error if either step fails; nothing is written in that case.
    pub fn save_snapshot(&mut self, repo: &RepoConfig, snapshot: &NewSnapshot) -> Result<i64> {
        if repo.id != snapshot.repo_id {
            return Err(Error::InvalidArgument(format!(
                "snapshot for '{}' cannot be saved under '{}'",
                snapshot.repo_id, repo.id
            )));
        }
        let row = Repository::from_config(repo, snapshot.timestamp);
        self.mutate("save_snapshot", |tx, ctx| {
            ensure_repository_tx(tx, &row)?;
            let id = insert_snapshot_tx(tx, snapshot)?;
            ctx.record_event(&snapshot.repo_id, EventType::Freeze, snapshot.timestamp);
            Ok(id)
        })
    }

    /// Most recent snapshot for a repository (timestamp desc, then id desc).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn latest_snapshot(&self, repo_id: &str) -> Result<Option<ContextSnapshot>> {
        Ok(self.list_snapshots(repo_id, 1)?.into_iter().next())
    }

    /// Snapshots for a repository, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_snapshots(&self, repo_id: &str, limit: usize) -> Result<Vec<ContextSnapshot>> {
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM context_snapshots
             WHERE repo_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![repo_id, limit], map_snapshot_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // ==================
    // Event Operations
    // ==================

    /// Append an event timestamped now.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_event(&mut self, repo_id: &str, event_type: EventType) -> Result<()> {
        self.record_event_at(repo_id, event_type, crate::model::now_millis())
    }

    /// Append an event with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_event_at(
        &mut self,
        repo_id: &str,
        event_type: EventType,
        timestamp: i64,
    ) -> Result<()> {
        self.mutate("record_event", |_tx, ctx| {
            ctx.record_event(repo_id, event_type, timestamp);
            Ok(())
        })
    }

    /// Events for a repository, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn events_for_repo(&self, repo_id: &str) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, repo_id)?)
    }

    // ==================
    // AI Usage Operations
    // ==================

    /// Append a usage log row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_usage(&mut self, entry: &UsageEntry) -> Result<i64> {
        self.mutate("record_usage", |tx, _ctx| {
            tx.execute(
                "INSERT INTO ai_usage_log
                    (timestamp, provider, model, input_tokens, output_tokens,
                     cost_estimate_usd, success, repo_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    entry.timestamp,
                    entry.provider,
                    entry.model,
                    to_sql_count(entry.input_tokens),
                    to_sql_count(entry.output_tokens),
                    entry.cost_estimate_usd,
                    entry.success,
                    entry.repo_id,
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    /// Sum of estimated cost for `provider` at or after `since` (Unix millis).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn monthly_spend(&self, provider: &str, since: i64) -> Result<f64> {
        let spend: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(cost_estimate_usd), 0.0) FROM ai_usage_log
             WHERE provider = ?1 AND timestamp >= ?2",
            rusqlite::params![provider, since],
            |row| row.get(0),
        )?;
        Ok(spend)
    }

    /// Per-provider usage totals at or after `since` (Unix millis).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn usage_summary(&self, since: i64) -> Result<Vec<UsageSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT provider,
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN success = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(input_tokens), 0),
                    COALESCE(SUM(output_tokens), 0),
                    COALESCE(SUM(cost_estimate_usd), 0.0)
             FROM ai_usage_log
             WHERE timestamp >= ?1
             GROUP BY provider
             ORDER BY provider",
        )?;
        let rows = stmt.query_map([since], |row| {
            Ok(UsageSummary {
                provider: row.get(0)?,
                calls: from_sql_count(row.get(1)?),
                failures: from_sql_count(row.get(2)?),
                input_tokens: from_sql_count(row.get(3)?),
                output_tokens: from_sql_count(row.get(4)?),
                cost_usd: row.get(5)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }
}

fn ensure_repository_tx(tx: &Transaction, repo: &Repository) -> Result<bool> {
    let inserted = tx.execute(
        "INSERT OR IGNORE INTO repositories (id, path, priority, active_branch, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            repo.id,
            repo.path,
            repo.priority,
            repo.active_branch,
            repo.created_at
        ],
    )?;
    if inserted > 0 {
        tracing::info!(repo = %repo.id, "Registered repository");
    }
    Ok(inserted > 0)
}

fn insert_snapshot_tx(tx: &Transaction, snapshot: &NewSnapshot) -> Result<i64> {
    let registered = tx
        .prepare("SELECT 1 FROM repositories WHERE id = ?1")?
        .exists([&snapshot.repo_id])?;
    if !registered {
        return Err(Error::RepoNotRegistered {
            id: snapshot.repo_id.clone(),
        });
    }

    tx.execute(
        "INSERT INTO context_snapshots
            (repo_id, timestamp, git_status_summary, terminal_last_command, terminal_output_summary,
             ai_sitrep, sitrep_failed, human_objective, human_blocker, human_next_step, human_note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            snapshot.repo_id,
            snapshot.timestamp,
            snapshot.git_status_summary,
            snapshot.terminal_last_command,
            snapshot.terminal_output_summary,
            snapshot.ai_sitrep,
            snapshot.sitrep_failed,
            snapshot.human.objective,
            snapshot.human.blocker,
            snapshot.human.next_step,
            snapshot.human.note,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

fn map_snapshot_row(row: &rusqlite::Row) -> rusqlite::Result<ContextSnapshot> {
    Ok(ContextSnapshot {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        timestamp: row.get(2)?,
        git_status_summary: row.get(3)?,
        terminal_last_command: row.get(4)?,
        terminal_output_summary: row.get(5)?,
        ai_sitrep: row.get(6)?,
        sitrep_failed: row.get(7)?,
        human: HumanContext {
            objective: row.get(8)?,
            blocker: row.get(9)?,
            next_step: row.get(10)?,
            note: row.get(11)?,
        },
    })
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_sql_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}
