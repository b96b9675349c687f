//! Switch command implementation.

use super::{print_json, runtime, AppContext};
use crate::config::{attach_target_path, inside_tmux, resolve_openai_api_key};
use crate::error::{Error, Result};
use crate::freeze::FreezeService;
use crate::model::{format_millis, ContextSnapshot};
use crate::switch::{SwitchOptions, SwitchOrchestrator, SwitchReport};
use crate::workspace::attach::write_attach_target;
use crate::workspace::{session_name, TmuxWorkspace};

use colored::Colorize;

/// Switch to `repo_id`. Returns whether the calling shell must attach the
/// target session.
///
/// # Errors
///
/// Returns `RepoNotFound` for an unknown id, a storage error if the store
/// cannot be opened, or an I/O error if the attach handoff cannot be written.
pub fn execute(ctx: &AppContext, repo_id: &str, json: bool) -> Result<bool> {
    ctx.config.repo(repo_id)?;
    let storage = ctx.open_storage()?;

    let freezer = FreezeService::from_config(&ctx.config.system, resolve_openai_api_key());
    let workspace = TmuxWorkspace::from_env();
    let orchestrator = SwitchOrchestrator::new(&ctx.config, &freezer, &workspace);
    let options = SwitchOptions {
        cwd: std::env::current_dir()?,
        mock: ctx.mock(),
        inside_multiplexer: inside_tmux(),
    };

    let report = runtime()?.block_on(orchestrator.run(repo_id, storage, &options))?;

    if report.must_attach {
        let file = attach_target_path()
            .ok_or_else(|| {
                Error::Config("Cannot determine home directory for the attach handoff".to_string())
            })?;
        write_attach_target(&file, &session_name(repo_id))?;
    }

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(report.must_attach)
}

fn print_report(report: &SwitchReport) {
    if let Some(source) = &report.detected {
        if *source != report.target {
            println!("{}", format!("Detected current repo: {source}").yellow());
        }
    }
    if let Some(err) = &report.freeze_error {
        let source = report.detected.as_deref().unwrap_or("current repo");
        println!("{}", format!("Failed to freeze {source}: {err}").red());
    }

    println!(
        "{}",
        format!(">>> WARPING TO {} >>>", report.target.to_uppercase()).green().bold()
    );

    for (label, err) in [
        ("Session", &report.session_error),
        ("Editor", &report.editor_error),
        ("Event log", &report.event_error),
        ("Snapshot lookup", &report.snapshot_error),
    ] {
        if let Some(err) = err {
            println!("{}", format!("{label}: {err}").yellow());
        }
    }

    println!();
    println!("{}", " SITREP ".reversed().bold());
    match &report.last_snapshot {
        Some(snapshot) => print_snapshot(snapshot),
        None => println!("{}", "No previous snapshot found.".italic()),
    }
}

/// Replay one snapshot: human note first, then the AI summary.
pub(crate) fn print_snapshot(snapshot: &ContextSnapshot) {
    if let Some(note) = snapshot.headline_note() {
        println!("{} {note}", ">>> HUMAN NOTE:".magenta().bold());
    }
    if let Some(blocker) = &snapshot.human.blocker {
        println!("{} {blocker}", ">>> BLOCKER:".red().bold());
    }
    if let Some(next) = &snapshot.human.next_step {
        println!("{} {next}", ">>> NEXT STEP:".green().bold());
    }
    println!("{} {}", ">>> AI SUMMARY:".cyan().bold(), snapshot.ai_sitrep);
    println!(
        "{} {}",
        ">>> TIMESTAMP:".yellow().bold(),
        format_millis(snapshot.timestamp)
    );
}
