//! Database schema definitions.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the Prime Directive database.
///
/// Timestamps are INTEGER Unix milliseconds (UTC).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Core Tables
-- ====================

-- Repositories: created lazily on first snapshot
CREATE TABLE IF NOT EXISTS repositories (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 0,
    active_branch TEXT,
    created_at INTEGER NOT NULL
);

-- Context Snapshots: one row per freeze, immutable
CREATE TABLE IF NOT EXISTS context_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    git_status_summary TEXT NOT NULL,
    terminal_last_command TEXT NOT NULL,
    terminal_output_summary TEXT NOT NULL,
    ai_sitrep TEXT NOT NULL,
    sitrep_failed INTEGER NOT NULL DEFAULT 0,
    human_objective TEXT,
    human_blocker TEXT,
    human_next_step TEXT,
    human_note TEXT,
    FOREIGN KEY (repo_id) REFERENCES repositories(id)
);

CREATE INDEX IF NOT EXISTS idx_snapshots_repo_time ON context_snapshots(repo_id, timestamp);

-- ====================
-- Append-only Logs
-- ====================

CREATE TABLE IF NOT EXISTS event_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_event_log_repo_time ON event_log(repo_id, timestamp);

CREATE TABLE IF NOT EXISTS ai_usage_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    cost_estimate_usd REAL NOT NULL DEFAULT 0,
    success INTEGER NOT NULL,
    repo_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_ai_usage_provider_time ON ai_usage_log(provider, timestamp);

-- ====================
-- Immutability Triggers
-- ====================

CREATE TRIGGER IF NOT EXISTS context_snapshots_no_update
BEFORE UPDATE ON context_snapshots
BEGIN
    SELECT RAISE(ABORT, 'context snapshots are immutable');
END;

CREATE TRIGGER IF NOT EXISTS event_log_no_update
BEFORE UPDATE ON event_log
BEGIN
    SELECT RAISE(ABORT, 'event log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS ai_usage_log_no_update
BEFORE UPDATE ON ai_usage_log
BEGIN
    SELECT RAISE(ABORT, 'usage log is append-only');
END;
";

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
