//! Editor launcher.

use super::WorkspaceError;
use crate::capture::binary_on_path;

use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

/// Arguments for `editor_cmd`: configured args, then the path.
#[must_use]
pub fn editor_args(path: &Path, args: &[String]) -> Vec<OsString> {
    args.iter()
        .map(OsString::from)
        .chain(std::iter::once(path.as_os_str().to_os_string()))
        .collect()
}

/// Spawn the editor detached from our stdio. The child is not waited on.
///
/// # Errors
///
/// Returns `NotInstalled` when `editor_cmd` is not on `PATH`, `Failed` when
/// the spawn itself fails.
pub fn launch(path: &Path, editor_cmd: &str, args: &[String]) -> Result<(), WorkspaceError> {
    let program = Path::new(editor_cmd);
    let found = if program.components().count() > 1 {
        program.is_file()
    } else {
        binary_on_path(editor_cmd)
    };
    if !found {
        return Err(WorkspaceError::NotInstalled(editor_cmd.to_string()));
    }

    Command::new(editor_cmd)
        .args(editor_args(path, args))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| WorkspaceError::Failed(format!("Could not execute '{editor_cmd}': {e}")))?;

    tracing::info!(editor = editor_cmd, path = %path.display(), "Launched editor");
    Ok(())
}
