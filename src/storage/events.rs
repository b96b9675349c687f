//! Event log storage and retrieval.
//!
//! Events are append-only markers (`SWITCH_IN`, `COMMIT`, `FREEZE`) used to
//! derive time-to-commit metrics.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// Kinds of events recorded per repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SwitchIn,
    Commit,
    Freeze,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SwitchIn => "SWITCH_IN",
            Self::Commit => "COMMIT",
            Self::Freeze => "FREEZE",
        }
    }
}

/// An event log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: i64,
    pub repo_id: String,
    pub event_type: EventType,
    /// Unix milliseconds (UTC)
    pub timestamp: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(repo_id: &str, event_type: EventType, timestamp: i64) -> Self {
        Self {
            id: 0,
            repo_id: repo_id.to_string(),
            event_type,
            timestamp,
        }
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO event_log (repo_id, event_type, timestamp) VALUES (?1, ?2, ?3)",
        rusqlite::params![event.repo_id, event.event_type.as_str(), event.timestamp],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events for a repository, oldest first.
///
/// Rows with an unrecognized type are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(conn: &Connection, repo_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, repo_id, event_type, timestamp
         FROM event_log
         WHERE repo_id = ?1
         ORDER BY timestamp ASC, id ASC",
    )?;

    let rows = stmt.query_map([repo_id], |row| {
        let kind: String = row.get(2)?;
        Ok((row.get(0)?, row.get(1)?, kind, row.get(3)?))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (id, repo_id, kind, timestamp): (i64, String, String, i64) = row?;
        match parse_event_type(&kind) {
            Some(event_type) => events.push(Event {
                id,
                repo_id,
                event_type,
                timestamp,
            }),
            None => tracing::debug!(id, kind = %kind, "Skipping unknown event type"),
        }
    }
    Ok(events)
}

/// Milliseconds from each `SWITCH_IN` to the next `COMMIT`.
///
/// `events` must be oldest first. A second `SWITCH_IN` before any commit
/// restarts the window; commits with no open window are ignored.
#[must_use]
pub fn time_to_commit(events: &[Event]) -> Vec<i64> {
    let mut open: Option<i64> = None;
    let mut durations = Vec::new();
    for event in events {
        match event.event_type {
            EventType::SwitchIn => open = Some(event.timestamp),
            EventType::Commit => {
                if let Some(start) = open.take() {
                    durations.push(event.timestamp - start);
                }
            }
            EventType::Freeze => {}
        }
    }
    durations
}

fn parse_event_type(s: &str) -> Option<EventType> {
    match s {
        "SWITCH_IN" => Some(EventType::SwitchIn),
        "COMMIT" => Some(EventType::Commit),
        "FREEZE" => Some(EventType::Freeze),
        _ => None,
    }
}
