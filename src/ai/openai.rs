//! OpenAI chat-completions provider.
//!
//! Hosted, paid backend. One call per request (no retry); usage counts
//! come back when the API reports them.

use super::{secs_f64, Completion, ProviderError, TextProvider, TokenUsage};
use crate::config::SystemConfig;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    timeout: Duration,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

impl OpenAiProvider {
    /// Create a provider. A blank key counts as absent.
    #[must_use]
    pub fn new(api_url: &str, api_key: Option<String>, timeout: Duration, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            timeout,
            max_tokens,
        }
    }

    /// Create a provider from the `system` config section and a credential.
    #[must_use]
    pub fn from_config(system: &SystemConfig, api_key: Option<String>) -> Self {
        Self::new(
            &system.openai_api_url,
            api_key,
            secs_f64(system.openai_timeout_seconds),
            system.openai_max_tokens,
        )
    }

    /// Whether an API key is configured.
    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

impl TextProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
    ) -> Result<Completion, ProviderError> {
        let Some(ref api_key) = self.api_key else {
            return Err(ProviderError::Unconfigured("OPENAI_API_KEY not set".to_string()));
        };

        let request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transient(format!(
                "OpenAI returned HTTP {status}: {body}"
            )));
        }

        let data: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::Malformed(format!("Failed to parse OpenAI response: {e}"))
        })?;

        let text = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                ProviderError::Malformed(
                    "No content in OpenAI response choices[0].message.content".to_string(),
                )
            })?;

        let usage = data.usage.map(|u| {
            let input_tokens = u.prompt_tokens.unwrap_or(0);
            let output_tokens = u.completion_tokens.unwrap_or(0);
            TokenUsage {
                input_tokens,
                output_tokens,
                total_tokens: u.total_tokens.unwrap_or(input_tokens + output_tokens),
            }
        });

        Ok(Completion { text, usage })
    }
}
