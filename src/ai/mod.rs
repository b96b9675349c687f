//! AI provider gateway.
//!
//! Two text-generation backends behind one call shape:
//! - **Ollama** (local, free) with retry and exponential backoff
//! - **OpenAI** (hosted, paid) with bearer auth and usage counts
//!
//! ```text
//!   SITREP generator
//!          │
//!     ┌────┴─────┐
//!     ▼          ▼
//! ┌───────┐  ┌────────┐
//! │Ollama │  │ OpenAI │──► budget ledger / usage log
//! └───────┘  └────────┘
//! ```
//!
//! Providers never log usage themselves; that is the caller's job.

pub mod budget;
pub mod ollama;
pub mod openai;
pub mod tokens;

pub use budget::{check_budget, estimate_cost, month_start, BudgetStatus, UsageLedger};
pub use ollama::{OllamaHealth, OllamaProvider};
pub use openai::OpenAiProvider;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Network error, timeout or non-success HTTP status.
    #[error("{0}")]
    Transient(String),

    /// The response arrived but lacked the expected fields.
    #[error("{0}")]
    Malformed(String),

    /// The provider cannot be called as configured (e.g. no API key).
    #[error("{0}")]
    Unconfigured(String),
}

impl ProviderError {
    /// Whether another attempt could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Malformed(_))
    }
}

/// Token counts reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Text returned by a provider plus any usage it reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Common shape of the generation backends.
pub trait TextProvider: Send + Sync {
    /// Provider name as stored in the usage log.
    fn name(&self) -> &'static str;

    /// Generate text for a system + user prompt with the given model.
    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
    ) -> impl Future<Output = Result<Completion, ProviderError>> + Send;
}

/// Convert fractional seconds from config into a `Duration`, clamping
/// negatives and NaN to zero.
#[must_use]
pub fn secs_f64(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}
