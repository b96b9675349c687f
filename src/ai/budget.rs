//! Monthly budget ledger for the paid provider.
//!
//! The cap is soft: it is checked before a call, so one call may overshoot.
//! Only hosted-provider rows count toward spend.

use crate::error::Result;
use crate::model::UsageEntry;
use crate::storage::SqliteStorage;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;

/// Provider name whose usage is billed.
pub const HOSTED_PROVIDER: &str = "openai";

/// Outcome of a budget check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub within_budget: bool,
    pub current_spend: f64,
    pub cap: f64,
}

/// Compare spend so far against the monthly cap. Spend equal to the cap is
/// already over budget.
#[must_use]
pub fn check_budget(current_spend: f64, cap: f64) -> BudgetStatus {
    BudgetStatus {
        within_budget: current_spend < cap,
        current_spend,
        cap,
    }
}

/// Estimated USD cost of a call: `(output_tokens / 1000) * cost_per_1k`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn estimate_cost(output_tokens: u64, cost_per_1k_tokens: f64) -> f64 {
    (output_tokens as f64 / 1000.0) * cost_per_1k_tokens
}

/// First instant of the UTC month containing `now`.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Where usage is logged and spend is summed.
pub trait UsageLedger {
    /// Total estimated cost for `provider` at or after `since` (Unix millis).
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    fn spend_since(&self, provider: &str, since: i64) -> Result<f64>;

    /// Append a usage row.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written.
    fn log_usage(&mut self, entry: &UsageEntry) -> Result<()>;

    /// Hosted-provider spend for the UTC month containing `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    fn current_month_spend(&self, now: DateTime<Utc>) -> Result<f64> {
        self.spend_since(HOSTED_PROVIDER, month_start(now).timestamp_millis())
    }
}

impl UsageLedger for SqliteStorage {
    fn spend_since(&self, provider: &str, since: i64) -> Result<f64> {
        self.monthly_spend(provider, since)
    }

    fn log_usage(&mut self, entry: &UsageEntry) -> Result<()> {
        self.record_usage(entry).map(|_| ())
    }
}
