//! Freeze command implementation.

use super::{print_json, runtime, AppContext};
use crate::cli::FreezeArgs;
use crate::config::resolve_openai_api_key;
use crate::error::Result;
use crate::freeze::FreezeService;
use crate::model::HumanContext;

use colored::Colorize;

/// Snapshot one repository.
///
/// # Errors
///
/// Returns `RepoNotFound` for an unknown id, or a storage error if the
/// snapshot cannot be saved. AI failures are stored, not returned.
pub fn execute(ctx: &AppContext, args: &FreezeArgs, json: bool) -> Result<()> {
    let repo = ctx.config.repo(&args.repo)?;
    let human = HumanContext::new(
        args.objective.clone(),
        args.blocker.clone(),
        args.next_step.clone(),
        Some(args.note.clone()),
    );

    if !json {
        println!("{}", format!("Freezing context for {}...", repo.id).blue().bold());
    }

    let service = FreezeService::from_config(&ctx.config.system, resolve_openai_api_key());
    let mut storage = ctx.open_storage()?;
    let report = runtime()?.block_on(service.freeze(&mut storage, repo, human))?;
    storage.close()?;

    if json {
        return print_json(&report);
    }

    println!("{}", format!("Snapshot saved. ID: {}", report.snapshot_id).green().bold());
    if let Some(note) = &report.human.note {
        println!("{} {note}", "YOUR NOTE:".magenta().bold());
    }
    if let Some(task) = &report.active_task {
        println!("{} #{} {}", "ACTIVE TASK:".cyan().bold(), task.id, task.title);
    }
    let sitrep = report.sitrep.display_text();
    if report.sitrep.is_failure() {
        println!("{}", sitrep.red());
    } else {
        println!("{}", sitrep.italic());
    }
    Ok(())
}
