//! Daemon command implementation.

use super::{runtime, AppContext};
use crate::config::resolve_openai_api_key;
use crate::daemon::{self, DaemonOptions};
use crate::error::{Error, Result};
use crate::freeze::FreezeService;

use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;

/// Watch every configured repository until interrupted.
///
/// # Errors
///
/// Returns `InvalidArgument` for a zero interval, or an error if the
/// watcher cannot start.
pub fn execute(ctx: &AppContext, interval_secs: u64, inactivity_secs: u64) -> Result<()> {
    if interval_secs == 0 {
        return Err(Error::InvalidArgument("--interval must be at least 1 second".to_string()));
    }
    let options = DaemonOptions {
        interval: Duration::from_secs(interval_secs),
        inactivity_limit: Duration::from_secs(inactivity_secs),
    };
    let freezer = Arc::new(FreezeService::from_config(
        &ctx.config.system,
        resolve_openai_api_key(),
    ));

    println!("{}", "Starting Prime Directive Daemon...".green().bold());
    runtime()?.block_on(daemon::run(
        ctx.config.clone(),
        ctx.db_path.clone(),
        freezer,
        options,
    ))
}
