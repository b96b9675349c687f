//! Domain records for Prime Directive.
//!
//! - Repository (store-side mirror of a configured repo)
//! - ContextSnapshot + HumanContext
//! - AI usage log entries

pub mod repository;
pub mod snapshot;
pub mod usage;

pub use repository::Repository;
pub use snapshot::{ContextSnapshot, HumanContext, NewSnapshot};
pub use usage::{UsageEntry, UsageSummary};

use chrono::{DateTime, Local, TimeZone, Utc};

/// Current time as Unix milliseconds (UTC).
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a millisecond timestamp in local time as `%Y-%m-%d %H:%M`.
#[must_use]
pub fn format_millis(ts: i64) -> String {
    match Utc.timestamp_millis_opt(ts).single() {
        Some(dt) => DateTime::<Local>::from(dt).format("%Y-%m-%d %H:%M").to_string(),
        None => "unknown".to_string(),
    }
}
