//! SITREP generation.
//!
//! Builds the prompt from human and machine context, picks the provider per
//! the configured policy, and folds every failure into a [`SitrepOutcome`].
//!
//! ```text
//! provider = openai ─► credential ─► budget ─► OpenAI ─► log usage
//!
//! provider = ollama ─► Ollama (retry/backoff) ─┬─ ok ─► done
//!                                              └─ err ─► fallback?
//!
//! fallback = none   ─► failed
//! fallback = openai ─► confirmation? ─► credential ─► budget ─► OpenAI ─► log usage
//! ```
//!
//! Only OpenAI calls touch the usage ledger.

use crate::ai::tokens::count_tokens;
use crate::ai::{
    check_budget, estimate_cost, OllamaProvider, OpenAiProvider, TextProvider, UsageLedger,
};
use crate::capture::ActiveTask;
use crate::config::{AiProviderKind, FallbackProvider, SystemConfig};
use crate::model::{HumanContext, UsageEntry};

use chrono::Utc;
use serde::Serialize;
use std::fmt::Write as _;

/// Fixed instruction sent as the system prompt.
pub const SYSTEM_PROMPT: &str = "You are the chief of staff for a senior engineer. \
Preserve and surface the human's strategic context so they can resume instantly. \
Rank inputs in this order: Human Objective, Human Blocker, Human Notes, Human Next Step. \
Git state and terminal logs are supporting evidence only. \
Never drop the Blocker or the Notes; mention both explicitly when present. \
Write a compact, decision-oriented SITREP covering what we were trying to achieve, \
what failed or is uncertain, and what to do next. \
Stay under 120 words and finish with an explicit NEXT STEP.";

/// Prefix of every failure's display text.
pub const ERROR_PREFIX: &str = "Error generating SITREP: ";

/// Provider selection and spending policy, decided per call.
#[derive(Debug, Clone, PartialEq)]
pub struct SitrepPolicy {
    pub provider: AiProviderKind,
    pub model: String,
    pub fallback: FallbackProvider,
    pub fallback_model: String,
    pub require_confirmation: bool,
    pub monthly_budget_usd: f64,
    pub cost_per_1k_tokens: f64,
}

impl SitrepPolicy {
    #[must_use]
    pub fn from_config(system: &SystemConfig) -> Self {
        Self {
            provider: system.ai_provider,
            model: system.ai_model.clone(),
            fallback: system.ai_fallback_provider,
            fallback_model: system.ai_fallback_model.clone(),
            require_confirmation: system.ai_require_confirmation,
            monthly_budget_usd: system.monthly_budget_usd,
            cost_per_1k_tokens: system.cost_per_1k_tokens,
        }
    }
}

/// Everything the prompt is built from.
#[derive(Debug, Clone, Copy)]
pub struct SitrepRequest<'a> {
    pub repo_id: &'a str,
    pub git_state: &'a str,
    pub terminal_logs: &'a str,
    pub active_task: Option<&'a ActiveTask>,
    pub human: &'a HumanContext,
}

/// Why no report was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SitrepFailureKind {
    MissingCredential,
    BudgetExceeded,
    ConfirmationRequired,
    Ledger,
    Provider,
}

/// Result of a generation attempt. Never an `Err`: a failure carries the
/// text that stands in for the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SitrepOutcome {
    Generated {
        text: String,
        provider: &'static str,
        model: String,
    },
    Failed {
        kind: SitrepFailureKind,
        detail: String,
    },
}

impl SitrepOutcome {
    fn failed(kind: SitrepFailureKind, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            detail: detail.into(),
        }
    }

    /// Text persisted in the snapshot.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Self::Generated { text, .. } => text.clone(),
            Self::Failed { detail, .. } => format!("{ERROR_PREFIX}{detail}"),
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Assemble the user prompt. Human context comes before machine signals.
#[must_use]
pub fn build_prompt(request: &SitrepRequest<'_>) -> String {
    let human = request.human;
    let human_info = if human.is_empty() {
        "None".to_string()
    } else {
        format!(
            "Objective: {}\nBlocker: {}\nNext Step: {}\nNotes: {}",
            human.objective.as_deref().unwrap_or("None"),
            human.blocker.as_deref().unwrap_or("None"),
            human.next_step.as_deref().unwrap_or("None"),
            human.note.as_deref().unwrap_or("None"),
        )
    };

    let task_info = request.active_task.map_or_else(
        || "None".to_string(),
        |task| {
            format!(
                "ID: {}\nTitle: {}\nDetails: {}",
                task.id,
                task.title,
                task.description.as_deref().unwrap_or("None")
            )
        },
    );

    let mut prompt = String::new();
    let _ = writeln!(prompt, "Context:");
    let _ = writeln!(prompt, "- Repository: {}", request.repo_id);
    let _ = writeln!(prompt, "- Human Context:\n{human_info}");
    let _ = writeln!(prompt, "- Active Task:\n{task_info}");
    let _ = writeln!(prompt, "- Git State:\n{}", request.git_state);
    let _ = writeln!(prompt, "- Recent Terminal Logs:\n{}", request.terminal_logs);
    let _ = write!(prompt, "\nGenerate a SITREP.");
    prompt
}

/// The SITREP generator: both backends plus the policy.
#[derive(Debug, Clone)]
pub struct SitrepGenerator {
    local: OllamaProvider,
    hosted: OpenAiProvider,
    policy: SitrepPolicy,
}

impl SitrepGenerator {
    #[must_use]
    pub fn new(local: OllamaProvider, hosted: OpenAiProvider, policy: SitrepPolicy) -> Self {
        Self {
            local,
            hosted,
            policy,
        }
    }

    /// Build from config plus the hosted credential.
    #[must_use]
    pub fn from_config(system: &SystemConfig, openai_api_key: Option<String>) -> Self {
        Self::new(
            OllamaProvider::from_config(system),
            OpenAiProvider::from_config(system, openai_api_key),
            SitrepPolicy::from_config(system),
        )
    }

    #[must_use]
    pub fn policy(&self) -> &SitrepPolicy {
        &self.policy
    }

    /// Generate a SITREP. Hosted usage is checked against and logged to
    /// `ledger`.
    pub async fn generate<L: UsageLedger + ?Sized>(
        &self,
        request: &SitrepRequest<'_>,
        ledger: &mut L,
    ) -> SitrepOutcome {
        let prompt = build_prompt(request);

        if self.policy.provider == AiProviderKind::Openai {
            return self
                .call_hosted(
                    &prompt,
                    &self.policy.model,
                    request.repo_id,
                    ledger,
                    "OPENAI_API_KEY not set",
                )
                .await;
        }

        let local = self
            .local
            .generate(SYSTEM_PROMPT, &prompt, &self.policy.model)
            .await;
        let local_error = match local {
            Ok(completion) => {
                return SitrepOutcome::Generated {
                    text: completion.text,
                    provider: self.local.name(),
                    model: self.policy.model.clone(),
                };
            }
            Err(e) => e,
        };

        match self.policy.fallback {
            FallbackProvider::None => {
                SitrepOutcome::failed(SitrepFailureKind::Provider, local_error.to_string())
            }
            FallbackProvider::Openai if self.policy.require_confirmation => {
                tracing::info!(
                    error = %local_error,
                    "Ollama failed; OpenAI fallback needs confirmation"
                );
                SitrepOutcome::failed(
                    SitrepFailureKind::ConfirmationRequired,
                    "OpenAI fallback requires confirmation",
                )
            }
            FallbackProvider::Openai => {
                tracing::info!(
                    error = %local_error,
                    model = %self.policy.fallback_model,
                    "Falling back to OpenAI"
                );
                self.call_hosted(
                    &prompt,
                    &self.policy.fallback_model,
                    request.repo_id,
                    ledger,
                    "OpenAI fallback requested but OPENAI_API_KEY not set",
                )
                .await
            }
        }
    }

    async fn call_hosted<L: UsageLedger + ?Sized>(
        &self,
        prompt: &str,
        model: &str,
        repo_id: &str,
        ledger: &mut L,
        missing_key_detail: &str,
    ) -> SitrepOutcome {
        if !self.hosted.has_credential() {
            return SitrepOutcome::failed(SitrepFailureKind::MissingCredential, missing_key_detail);
        }

        let now = Utc::now();
        let spend = match ledger.current_month_spend(now) {
            Ok(spend) => spend,
            Err(e) => {
                return SitrepOutcome::failed(
                    SitrepFailureKind::Ledger,
                    format!("Budget check failed: {e}"),
                );
            }
        };

        let budget = check_budget(spend, self.policy.monthly_budget_usd);
        if !budget.within_budget {
            tracing::warn!(
                spend = budget.current_spend,
                cap = budget.cap,
                "Monthly AI budget exceeded"
            );
            return SitrepOutcome::failed(
                SitrepFailureKind::BudgetExceeded,
                format!(
                    "Monthly budget exceeded (${:.2}/${:.2})",
                    budget.current_spend, budget.cap
                ),
            );
        }

        let provider = self.hosted.name();
        match self.hosted.generate(SYSTEM_PROMPT, prompt, model).await {
            Ok(completion) => {
                let (input_tokens, output_tokens) = match completion.usage {
                    Some(usage) => (usage.input_tokens, usage.output_tokens),
                    None => (
                        count_tokens(&format!("{SYSTEM_PROMPT}\n{prompt}"), model),
                        count_tokens(&completion.text, model),
                    ),
                };
                let cost = estimate_cost(output_tokens, self.policy.cost_per_1k_tokens);
                let entry = UsageEntry {
                    timestamp: now.timestamp_millis(),
                    provider: provider.to_string(),
                    model: model.to_string(),
                    input_tokens,
                    output_tokens,
                    cost_estimate_usd: cost,
                    success: true,
                    repo_id: Some(repo_id.to_string()),
                };
                if let Err(e) = ledger.log_usage(&entry) {
                    tracing::warn!(error = %e, "Failed to log AI usage");
                }
                tracing::info!(model, output_tokens, cost, "OpenAI call logged");

                SitrepOutcome::Generated {
                    text: completion.text,
                    provider,
                    model: model.to_string(),
                }
            }
            Err(e) => {
                let entry =
                    UsageEntry::failed(provider, model, Some(repo_id), now.timestamp_millis());
                if let Err(log_err) = ledger.log_usage(&entry) {
                    tracing::warn!(error = %log_err, "Failed to log AI usage");
                }
                SitrepOutcome::failed(SitrepFailureKind::Provider, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn policy(provider: AiProviderKind, fallback: FallbackProvider, confirm: bool) -> SitrepPolicy {
        SitrepPolicy {
            provider,
            model: if provider == AiProviderKind::Openai {
                "gpt-4o-mini".to_string()
            } else {
                "qwen2.5-coder".to_string()
            },
            fallback,
            fallback_model: "gpt-4o-mini".to_string(),
            require_confirmation: confirm,
            monthly_budget_usd: 10.0,
            cost_per_1k_tokens: 0.002,
        }
    }

    fn generator(
        ollama: &MockServer,
        openai: &MockServer,
        key: Option<&str>,
        policy: SitrepPolicy,
    ) -> SitrepGenerator {
        SitrepGenerator::new(
            OllamaProvider::new(
                &format!("{}/api/generate", ollama.uri()),
                Duration::from_secs(2),
                1,
                Duration::ZERO,
            ),
            OpenAiProvider::new(
                &format!("{}/v1/chat/completions", openai.uri()),
                key.map(str::to_string),
                Duration::from_secs(2),
                150,
            ),
            policy,
        )
    }

    fn request<'a>(human: &'a HumanContext) -> SitrepRequest<'a> {
        SitrepRequest {
            repo_id: "api",
            git_state: "Branch: main",
            terminal_logs: "$ cargo test",
            active_task: None,
            human,
        }
    }

    async fn ollama_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"response": "local report"})),
            )
            .mount(server)
            .await;
    }

    async fn ollama_down(server: &MockServer) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }

    async fn openai_ok(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "hosted report"}}],
                "usage": {"prompt_tokens": 200, "completion_tokens": 500, "total_tokens": 700}
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn usage_rows(storage: &SqliteStorage) -> Vec<(String, String, i64, f64, bool)> {
        let mut stmt = storage
            .conn()
            .prepare(
                "SELECT provider, model, output_tokens, cost_estimate_usd, success
                 FROM ai_usage_log ORDER BY id",
            )
            .unwrap();
        stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_prompt_puts_human_context_first() {
        let human =
            HumanContext::new(Some("ship auth".into()), Some("flaky CI".into()), None, None);
        let task = ActiveTask {
            id: "7".into(),
            title: "JWT".into(),
            description: None,
            priority: "high".into(),
        };
        let mut req = request(&human);
        req.active_task = Some(&task);
        let prompt = build_prompt(&req);

        let human_at = prompt.find("Blocker: flaky CI").unwrap();
        let git_at = prompt.find("Branch: main").unwrap();
        assert!(human_at < git_at);
        assert!(prompt.contains("Next Step: None"));
        assert!(prompt.contains("Title: JWT"));
        assert!(prompt.ends_with("Generate a SITREP."));
    }

    #[test]
    fn test_prompt_without_human_context() {
        let human = HumanContext::default();
        let prompt = build_prompt(&request(&human));
        assert!(prompt.contains("- Human Context:\nNone"));
        assert!(prompt.contains("- Active Task:\nNone"));
    }

    #[tokio::test]
    async fn test_local_success_logs_nothing() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        ollama_ok(&ollama).await;
        openai_ok(&openai, 0).await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Ollama, FallbackProvider::Openai, false);
        let outcome = generator(&ollama, &openai, Some("k"), policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert_eq!(outcome.display_text(), "local report");
        assert!(usage_rows(&storage).is_empty());
    }

    #[tokio::test]
    async fn test_local_failure_without_fallback() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        ollama_down(&ollama).await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Ollama, FallbackProvider::None, false);
        let outcome = generator(&ollama, &openai, Some("k"), policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert!(outcome.is_failure());
        assert!(outcome.display_text().starts_with(ERROR_PREFIX));
        assert!(outcome.display_text().contains("500"));
    }

    #[tokio::test]
    async fn test_fallback_requiring_confirmation_makes_no_hosted_call() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        ollama_down(&ollama).await;
        openai_ok(&openai, 0).await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Ollama, FallbackProvider::Openai, true);
        let outcome = generator(&ollama, &openai, Some("k"), policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert!(matches!(
            outcome,
            SitrepOutcome::Failed { kind: SitrepFailureKind::ConfirmationRequired, .. }
        ));
        assert!(outcome.display_text().contains("confirmation"));
        assert!(usage_rows(&storage).is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_fallback_uses_hosted_and_logs_usage() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        ollama_down(&ollama).await;
        openai_ok(&openai, 1).await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Ollama, FallbackProvider::Openai, false);
        let outcome = generator(&ollama, &openai, Some("k"), policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert_eq!(
            outcome,
            SitrepOutcome::Generated {
                text: "hosted report".into(),
                provider: "openai",
                model: "gpt-4o-mini".into()
            }
        );
        let rows = usage_rows(&storage);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "openai");
        assert_eq!(rows[0].2, 500);
        assert!((rows[0].3 - 0.001).abs() < 1e-12);
        assert!(rows[0].4);
    }

    #[tokio::test]
    async fn test_fallback_without_key() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        ollama_down(&ollama).await;
        openai_ok(&openai, 0).await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Ollama, FallbackProvider::Openai, false);
        let outcome = generator(&ollama, &openai, None, policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert_eq!(
            outcome.display_text(),
            "Error generating SITREP: OpenAI fallback requested but OPENAI_API_KEY not set"
        );
    }

    #[tokio::test]
    async fn test_hosted_primary_without_key_fails_fast() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        openai_ok(&openai, 0).await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Openai, FallbackProvider::None, true);
        let outcome = generator(&ollama, &openai, None, policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert_eq!(outcome.display_text(), "Error generating SITREP: OPENAI_API_KEY not set");
    }

    #[tokio::test]
    async fn test_hosted_primary_over_budget_makes_no_call() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        openai_ok(&openai, 0).await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .record_usage(&UsageEntry {
                timestamp: Utc::now().timestamp_millis(),
                provider: "openai".into(),
                model: "gpt-4o-mini".into(),
                input_tokens: 0,
                output_tokens: 0,
                cost_estimate_usd: 10.0,
                success: true,
                repo_id: None,
            })
            .unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Openai, FallbackProvider::None, true);
        let outcome = generator(&ollama, &openai, Some("k"), policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert_eq!(
            outcome.display_text(),
            "Error generating SITREP: Monthly budget exceeded ($10.00/$10.00)"
        );
    }

    #[tokio::test]
    async fn test_hosted_failure_logs_failed_usage() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&openai)
            .await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Openai, FallbackProvider::None, true);
        let outcome = generator(&ollama, &openai, Some("k"), policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert!(outcome.is_failure());
        let rows = usage_rows(&storage);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].2, 0);
        assert!(!rows[0].4);
    }

    #[tokio::test]
    async fn test_blank_hosted_reply_is_a_failed_call() {
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "  \n "}}]
            })))
            .expect(1)
            .mount(&openai)
            .await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();
        let policy = policy(AiProviderKind::Openai, FallbackProvider::None, true);

        let outcome = generator(&ollama, &openai, Some("k"), policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert!(outcome.is_failure());
        let rows = usage_rows(&storage);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].4);
    }

    #[tokio::test]
    async fn test_missing_usage_is_estimated() {
        const REPLY: &str = "Resume the auth refactor. NEXT STEP: rerun CI.";
        let (ollama, openai) = (MockServer::start().await, MockServer::start().await);
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": REPLY}}]
            })))
            .mount(&openai)
            .await;
        let mut storage = SqliteStorage::open_memory().unwrap();
        let human = HumanContext::default();

        let policy = policy(AiProviderKind::Openai, FallbackProvider::None, true);
        let outcome = generator(&ollama, &openai, Some("k"), policy)
            .generate(&request(&human), &mut storage)
            .await;

        assert!(!outcome.is_failure());
        let rows = usage_rows(&storage);
        let expected = count_tokens(REPLY, "gpt-4o-mini");
        assert_eq!(rows[0].2, i64::try_from(expected).unwrap());
    }
}
