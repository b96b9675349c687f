//! Metrics command implementation.

use super::{print_json, AppContext};
use crate::config::RepoConfig;
use crate::error::Result;
use crate::storage::time_to_commit;

use colored::Colorize;
use serde::Serialize;

/// Time-to-commit statistics for one repository, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitMetrics {
    pub repo_id: String,
    pub samples: usize,
    pub average_ms: Option<i64>,
    pub fastest_ms: Option<i64>,
    pub slowest_ms: Option<i64>,
}

impl CommitMetrics {
    #[must_use]
    pub fn from_durations(repo_id: &str, durations: &[i64]) -> Self {
        let average_ms = i64::try_from(durations.len())
            .ok()
            .filter(|n| *n > 0)
            .map(|n| durations.iter().sum::<i64>() / n);
        Self {
            repo_id: repo_id.to_string(),
            samples: durations.len(),
            average_ms,
            fastest_ms: durations.iter().min().copied(),
            slowest_ms: durations.iter().max().copied(),
        }
    }
}

/// `1h 05m`, `12m 30s` or `45s`.
#[must_use]
pub fn format_duration(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m")
    } else if m > 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Print time-to-commit metrics for one or all repositories.
///
/// # Errors
///
/// Returns `RepoNotFound` for an unknown id or a storage error.
pub fn execute(ctx: &AppContext, repo_id: Option<&str>, json: bool) -> Result<()> {
    let repos: Vec<&RepoConfig> = match repo_id {
        Some(id) => vec![ctx.config.repo(id)?],
        None => ctx.config.repos_by_priority(),
    };

    let storage = ctx.open_storage()?;
    let mut metrics = Vec::with_capacity(repos.len());
    for repo in repos {
        let events = storage.events_for_repo(&repo.id)?;
        metrics.push(CommitMetrics::from_durations(&repo.id, &time_to_commit(&events)));
    }
    storage.close()?;

    if json {
        return print_json(&metrics);
    }

    println!("{}", "Time to first commit after switching in".bold());
    for m in &metrics {
        match (m.average_ms, m.fastest_ms, m.slowest_ms) {
            (Some(avg), Some(fast), Some(slow)) => println!(
                "  {:<16} avg {:<10} fastest {:<10} slowest {:<10} ({} samples)",
                m.repo_id.cyan(),
                format_duration(avg),
                format_duration(fast),
                format_duration(slow),
                m.samples
            ),
            _ => println!("  {:<16} {}", m.repo_id.cyan(), "no data".dimmed()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_from_durations() {
        let m = CommitMetrics::from_durations("api", &[60_000, 180_000, 120_000]);
        assert_eq!(m.samples, 3);
        assert_eq!(m.average_ms, Some(120_000));
        assert_eq!(m.fastest_ms, Some(60_000));
        assert_eq!(m.slowest_ms, Some(180_000));

        let empty = CommitMetrics::from_durations("web", &[]);
        assert_eq!(empty.average_ms, None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45_000), "45s");
        assert_eq!(format_duration(750_000), "12m 30s");
        assert_eq!(format_duration(3_900_000), "1h 05m");
    }
}
