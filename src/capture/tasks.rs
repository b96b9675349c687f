//! Active task lookup from `.taskmaster/tasks/tasks.json`.
//!
//! The file maps tag names to `{ "tasks": [...] }`. Tasks with status
//! `in-progress` are ranked by priority (high > medium > low, unknown lowest)
//! and then by numeric id, highest first.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// The task the engineer is working on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub priority: String,
}

/// Find the active task for a repository. Missing or unreadable files yield
/// `None`.
#[must_use]
pub fn get_active_task(repo_path: &Path) -> Option<ActiveTask> {
    let path = repo_path.join(".taskmaster").join("tasks").join("tasks.json");
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<Value>(&content) {
        Ok(data) => select_active_task(&data),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Unparseable tasks file");
            None
        }
    }
}

fn select_active_task(data: &Value) -> Option<ActiveTask> {
    let tags = data.as_object()?;

    tags.values()
        .filter_map(|tag| tag.get("tasks")?.as_array())
        .flatten()
        .filter(|task| task.get("status").and_then(Value::as_str) == Some("in-progress"))
        .max_by_key(|task| (priority_rank(task), numeric_id(task)))
        .map(|task| ActiveTask {
            id: task.get("id").map(value_text).unwrap_or_default(),
            title: task.get("title").map(value_text).unwrap_or_default(),
            description: task
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            priority: task
                .get("priority")
                .and_then(Value::as_str)
                .unwrap_or("medium")
                .to_string(),
        })
}

fn priority_rank(task: &Value) -> u8 {
    let priority = task
        .get("priority")
        .and_then(Value::as_str)
        .unwrap_or("medium")
        .to_ascii_lowercase();
    match priority.as_str() {
        "high" => 3,
        "medium" => 2,
        _ => 1,
    }
}

fn numeric_id(task: &Value) -> i64 {
    match task.get("id") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
