//! Ollama text-generation provider.
//!
//! Local backend. Each call is retried up to `max_retries` times with
//! `backoff * 2^attempt` between attempts.

use super::{secs_f64, Completion, ProviderError, TextProvider};
use crate::config::SystemConfig;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Ollama provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
}

/// Result of probing the local server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OllamaHealth {
    pub running: bool,
    pub model_available: bool,
}

/// Ollama API request for generation.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
}

/// Ollama API response for generation.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// Ollama API response for listing models.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Option<Vec<TagModel>>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaProvider {
    /// Create a provider against `api_url` (the `/api/generate` endpoint).
    #[must_use]
    pub fn new(api_url: &str, timeout: Duration, max_retries: u32, backoff: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            timeout,
            max_retries,
            backoff,
        }
    }

    /// Create a provider from the `system` config section.
    #[must_use]
    pub fn from_config(system: &SystemConfig) -> Self {
        Self::new(
            &system.ollama_api_url,
            secs_f64(system.ollama_timeout_seconds),
            system.ollama_max_retries,
            secs_f64(system.ollama_backoff_seconds),
        )
    }

    /// Server root derived from the generate endpoint.
    fn base_url(&self) -> &str {
        let url = self.api_url.trim_end_matches('/');
        url.strip_suffix("/api/generate").unwrap_or(url)
    }

    /// Probe `/api/tags` to see whether the server runs and has `model`.
    pub async fn health(&self, model: &str) -> OllamaHealth {
        let url = format!("{}/api/tags", self.base_url());

        let response = match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            _ => return OllamaHealth::default(),
        };

        let Ok(data) = response.json::<TagsResponse>().await else {
            return OllamaHealth {
                running: true,
                model_available: false,
            };
        };

        let model_available = data.models.is_some_and(|models| {
            models
                .iter()
                .any(|m| m.name == model || m.name.starts_with(&format!("{model}:")))
        });

        OllamaHealth {
            running: true,
            model_available,
        }
    }

    async fn generate_once(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
    ) -> Result<String, ProviderError> {
        let request = GenerateRequest {
            model,
            prompt: user_prompt,
            system: system_prompt,
            stream: false,
        };

        let response = self
            .client
            .post(&self.api_url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    ProviderError::Unconfigured(format!("Invalid Ollama URL {}: {e}", self.api_url))
                } else {
                    ProviderError::Transient(format!("Ollama request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transient(format!(
                "Ollama returned HTTP {status}: {body}"
            )));
        }

        let data: GenerateResponse = response.json().await.map_err(|e| {
            ProviderError::Malformed(format!("Failed to parse Ollama response: {e}"))
        })?;

        match data.response {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            _ => Err(ProviderError::Malformed(
                "Ollama response missing 'response' field".to_string(),
            )),
        }
    }
}

impl TextProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        model: &str,
    ) -> Result<Completion, ProviderError> {
        let text = retry_with_backoff(self.max_retries, self.backoff, || {
            self.generate_once(system_prompt, user_prompt, model)
        })
        .await?;
        Ok(Completion { text, usage: None })
    }
}

/// Run `op` up to `max_retries + 1` times, sleeping `backoff * 2^attempt`
/// after each retryable failure. Returns the last error.
async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = max_retries.saturating_add(1);
    let mut attempt = 0u32;

    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        tracing::warn!(attempt = attempt + 1, attempts, error = %error, "Ollama call failed");

        if !error.is_retryable() || attempt + 1 >= attempts {
            return Err(error);
        }
        tokio::time::sleep(backoff.saturating_mul(2u32.saturating_pow(attempt))).await;
        attempt += 1;
    }
}
