//! Doctor command implementation.

use super::{print_json, runtime, AppContext};
use crate::ai::OllamaProvider;
use crate::capture::binary_on_path;
use crate::config::resolve_openai_api_key;
use crate::error::Result;

use colored::Colorize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckState {
    Ok,
    Warn,
    Fail,
}

impl CheckState {
    fn icon(self) -> &'static str {
        match self {
            Self::Ok => "✅",
            Self::Warn => "⚠️",
            Self::Fail => "❌",
        }
    }
}

#[derive(Debug, Serialize)]
struct Check {
    name: String,
    state: CheckState,
    detail: String,
}

impl Check {
    fn new(name: impl Into<String>, state: CheckState, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state,
            detail: detail.into(),
        }
    }
}

fn binary_check(name: String, program: &str, missing: &str) -> Check {
    if binary_on_path(program) {
        Check::new(name, CheckState::Ok, program)
    } else {
        Check::new(name, CheckState::Fail, missing)
    }
}

/// Run environment checks and print the results.
///
/// # Errors
///
/// Returns an error if the async runtime cannot start or JSON output fails.
pub fn execute(ctx: &AppContext, json: bool) -> Result<()> {
    let system = &ctx.config.system;
    let mut checks = Vec::new();
    let editor_name = format!("Editor ({})", system.editor_cmd);

    if ctx.mock() {
        checks.push(Check::new("Tmux Installed", CheckState::Ok, "Mocked"));
        checks.push(Check::new(editor_name, CheckState::Ok, "Mocked"));
        checks.push(Check::new("AI Engine (Ollama)", CheckState::Ok, "Mocked"));
        checks.push(Check::new("OpenAI Fallback", CheckState::Ok, "Mocked"));
    } else {
        checks.push(binary_check("Tmux Installed".to_string(), "tmux", "Not found"));
        checks.push(binary_check(editor_name, &system.editor_cmd, "Not found in PATH"));

        let ollama = OllamaProvider::from_config(system);
        let health = runtime()?.block_on(ollama.health(&system.ai_model));
        checks.push(if !health.running {
            Check::new(
                "AI Engine (Ollama)",
                CheckState::Fail,
                format!("Not running at {}. Start: ollama serve", system.ollama_api_url),
            )
        } else if !health.model_available {
            Check::new(
                "AI Engine (Ollama)",
                CheckState::Warn,
                format!("Model {} missing. Pull: ollama pull {}", system.ai_model, system.ai_model),
            )
        } else {
            Check::new(
                "AI Engine (Ollama)",
                CheckState::Ok,
                format!("Running, {} available", system.ai_model),
            )
        });

        checks.push(if resolve_openai_api_key().is_some() {
            Check::new("OpenAI Fallback", CheckState::Ok, "OPENAI_API_KEY set")
        } else {
            Check::new("OpenAI Fallback", CheckState::Warn, "OPENAI_API_KEY not set")
        });
    }

    for repo in ctx.config.repos.values() {
        if repo.path.exists() {
            let path = repo.path.display().to_string();
            checks.push(Check::new(format!("Repo {}", repo.id), CheckState::Ok, path));
        } else {
            let name = format!("Repo {}", repo.id);
            checks.push(Check::new(name, CheckState::Fail, "Path not found"));
        }
    }

    tracing::info!(
        failed = checks.iter().filter(|c| c.state == CheckState::Fail).count(),
        "Doctor checks complete"
    );

    if json {
        return print_json(&checks);
    }

    println!("{}", "Prime Directive Doctor".bold());
    if ctx.mock() {
        println!("{}", "MOCK MODE ENABLED".yellow().bold());
    }
    for check in &checks {
        println!("  {} {:<24} {}", check.state.icon(), check.name, check.detail.dimmed());
    }
    Ok(())
}
