//! Version command implementation.

use super::print_json;
use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    schema: i32,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) { "dev" } else { "release" };
    let schema = crate::storage::schema::CURRENT_SCHEMA_VERSION;

    if json {
        return print_json(&VersionOutput { version, build, schema });
    }

    println!("pd version {version} ({build}, schema v{schema})");
    Ok(())
}
