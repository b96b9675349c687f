//! Context snapshots.
//!
//! One snapshot is written per freeze and never changes afterwards.

use serde::{Deserialize, Serialize};

/// Operator-supplied context. Always ranked above machine signals in the
/// SITREP prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanContext {
    pub objective: Option<String>,
    pub blocker: Option<String>,
    pub next_step: Option<String>,
    pub note: Option<String>,
}

impl HumanContext {
    /// Build from raw CLI values, dropping blank fields.
    #[must_use]
    pub fn new(
        objective: Option<String>,
        blocker: Option<String>,
        next_step: Option<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            objective: non_blank(objective),
            blocker: non_blank(blocker),
            next_step: non_blank(next_step),
            note: non_blank(note),
        }
    }

    /// True when no field was provided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objective.is_none()
            && self.blocker.is_none()
            && self.next_step.is_none()
            && self.note.is_none()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A snapshot about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub repo_id: String,
    /// Unix milliseconds (UTC)
    pub timestamp: i64,
    pub git_status_summary: String,
    pub terminal_last_command: String,
    pub terminal_output_summary: String,
    pub ai_sitrep: String,
    /// The SITREP text is an error placeholder, not a generated report.
    pub sitrep_failed: bool,
    pub human: HumanContext,
}

/// A persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub id: i64,
    pub repo_id: String,
    /// Unix milliseconds (UTC)
    pub timestamp: i64,
    pub git_status_summary: String,
    pub terminal_last_command: String,
    pub terminal_output_summary: String,
    pub ai_sitrep: String,
    pub sitrep_failed: bool,
    #[serde(flatten)]
    pub human: HumanContext,
}

impl ContextSnapshot {
    /// The note shown first when replaying a snapshot.
    ///
    /// Falls back to the objective when no free-form note was given.
    #[must_use]
    pub fn headline_note(&self) -> Option<&str> {
        self.human
            .note
            .as_deref()
            .or(self.human.objective.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_dropped() {
        let human = HumanContext::new(Some("  ".into()), None, Some("ship it".into()), None);
        assert!(human.objective.is_none());
        assert_eq!(human.next_step.as_deref(), Some("ship it"));
        assert!(!human.is_empty());
        assert!(HumanContext::default().is_empty());
    }

    #[test]
    fn test_headline_prefers_note() {
        let mut snap = ContextSnapshot {
            id: 1,
            repo_id: "a".into(),
            timestamp: 0,
            git_status_summary: String::new(),
            terminal_last_command: String::new(),
            terminal_output_summary: String::new(),
            ai_sitrep: String::new(),
            sitrep_failed: false,
            human: HumanContext::new(Some("objective".into()), None, None, None),
        };
        assert_eq!(snap.headline_note(), Some("objective"));
        snap.human.note = Some("note".into());
        assert_eq!(snap.headline_note(), Some("note"));
    }
}
