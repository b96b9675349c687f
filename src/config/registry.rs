//! Registry file parsing (`config.yaml`).
//!
//! ```yaml
//! system:
//!   editor_cmd: code
//!   ai_provider: ollama
//!   ai_fallback_provider: openai
//!   ai_require_confirmation: false
//! repos:
//!   api:
//!     path: ~/src/api
//!     priority: 9
//!   web:
//!     path: ../web
//! ```
//!
//! `repos` may also be a list of entries that each carry an `id`.

use crate::config::{expand_tilde, normalize_path};
use crate::error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Which backend serves SITREP generation first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    #[default]
    Ollama,
    Openai,
}

impl AiProviderKind {
    /// Provider name as stored in the usage log.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Openai => "openai",
        }
    }
}

impl fmt::Display for AiProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when the local backend fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackProvider {
    #[default]
    None,
    Openai,
}

/// The `system` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub editor_cmd: String,
    pub editor_args: Vec<String>,
    pub ai_model: String,
    pub ai_provider: AiProviderKind,
    pub ai_fallback_provider: FallbackProvider,
    pub ai_fallback_model: String,
    pub ai_require_confirmation: bool,
    pub openai_api_url: String,
    pub openai_timeout_seconds: f64,
    pub openai_max_tokens: u32,
    pub ollama_api_url: String,
    pub ollama_timeout_seconds: f64,
    pub ollama_max_retries: u32,
    pub ollama_backoff_seconds: f64,
    pub monthly_budget_usd: f64,
    pub cost_per_1k_tokens: f64,
    pub db_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub mock_mode: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            editor_cmd: "windsurf".to_string(),
            editor_args: vec!["-n".to_string()],
            ai_model: "qwen2.5-coder".to_string(),
            ai_provider: AiProviderKind::Ollama,
            ai_fallback_provider: FallbackProvider::None,
            ai_fallback_model: "gpt-4o-mini".to_string(),
            ai_require_confirmation: true,
            openai_api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            openai_timeout_seconds: 10.0,
            openai_max_tokens: 150,
            ollama_api_url: "http://localhost:11434/api/generate".to_string(),
            ollama_timeout_seconds: 5.0,
            ollama_max_retries: 2,
            ollama_backoff_seconds: 0.5,
            monthly_budget_usd: 10.0,
            cost_per_1k_tokens: 0.002,
            db_path: None,
            log_path: None,
            mock_mode: false,
        }
    }
}

/// A configured repository. Read-only for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoConfig {
    pub id: String,
    pub path: PathBuf,
    pub priority: i64,
    pub active_branch: String,
}

/// The whole registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimeConfig {
    pub system: SystemConfig,
    pub repos: BTreeMap<String, RepoConfig>,
}

impl PrimeConfig {
    /// Look up a repository, failing with the list of known ids.
    ///
    /// # Errors
    ///
    /// Returns `RepoNotFound` if `id` is not configured.
    pub fn repo(&self, id: &str) -> Result<&RepoConfig> {
        self.repos
            .get(id)
            .ok_or_else(|| Error::repo_not_found(id, self.repos.keys()))
    }

    /// Repositories ordered by priority, highest first.
    #[must_use]
    pub fn repos_by_priority(&self) -> Vec<&RepoConfig> {
        let mut repos: Vec<&RepoConfig> = self.repos.values().collect();
        repos.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        repos
    }
}

// ── Raw file shape ────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    system: SystemConfig,
    repos: Option<RawRepos>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRepos {
    Map(BTreeMap<String, RawRepo>),
    List(Vec<RawRepo>),
}

#[derive(Debug, Deserialize)]
struct RawRepo {
    id: Option<String>,
    path: String,
    #[serde(default)]
    priority: i64,
    #[serde(default = "default_branch")]
    active_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// Parse registry text. Relative paths are resolved against `base_dir`.
///
/// # Errors
///
/// Returns `Error::Config` on invalid YAML, a list entry without `id`,
/// or a duplicated id.
pub fn parse_config(content: &str, base_dir: &Path) -> Result<PrimeConfig> {
    if content.trim().is_empty() {
        return Ok(PrimeConfig::default());
    }

    let raw: Option<RawConfig> =
        serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
    let raw = raw.unwrap_or_default();

    let mut system = raw.system;
    system.db_path = system.db_path.map(|p| resolve_path(&p, base_dir));
    system.log_path = system.log_path.map(|p| resolve_path(&p, base_dir));

    let entries: Vec<(String, RawRepo)> = match raw.repos {
        None => Vec::new(),
        Some(RawRepos::Map(map)) => map
            .into_iter()
            .map(|(key, repo)| (repo.id.clone().unwrap_or(key), repo))
            .collect(),
        Some(RawRepos::List(list)) => list
            .into_iter()
            .map(|repo| {
                repo.id
                    .clone()
                    .map(|id| (id, repo))
                    .ok_or_else(|| Error::Config("repository entry is missing `id`".to_string()))
            })
            .collect::<Result<_>>()?,
    };

    let mut repos = BTreeMap::new();
    for (id, raw_repo) in entries {
        if id.trim().is_empty() {
            return Err(Error::Config("repository id must not be empty".to_string()));
        }
        let repo = RepoConfig {
            id: id.clone(),
            path: resolve_path(Path::new(&raw_repo.path), base_dir),
            priority: raw_repo.priority,
            active_branch: raw_repo.active_branch,
        };
        if repos.insert(id.clone(), repo).is_some() {
            return Err(Error::Config(format!("duplicate repository id '{id}'")));
        }
    }

    Ok(PrimeConfig { system, repos })
}

fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    let expanded = expand_tilde(&path.to_string_lossy());
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    };
    normalize_path(&absolute)
}
