//! AI usage accounting records.

use serde::{Deserialize, Serialize};

/// One row of the append-only AI usage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    /// Unix milliseconds (UTC)
    pub timestamp: i64,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_estimate_usd: f64,
    pub success: bool,
    pub repo_id: Option<String>,
}

impl UsageEntry {
    /// A failed call: zero tokens, zero cost.
    #[must_use]
    pub fn failed(provider: &str, model: &str, repo_id: Option<&str>, timestamp: i64) -> Self {
        Self {
            timestamp,
            provider: provider.to_string(),
            model: model.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            cost_estimate_usd: 0.0,
            success: false,
            repo_id: repo_id.map(str::to_string),
        }
    }
}

/// Aggregated usage for one provider over a period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub provider: String,
    pub calls: u64,
    pub failures: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}
