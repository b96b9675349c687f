//! Attach handoff to the calling shell.
//!
//! `pd switch` writes the target session name to the attach file and exits
//! with [`ATTACH_EXIT_CODE`]; the wrapper from `pd shell-init` sees the code,
//! reads the file and runs `tmux attach-session` in the user's terminal.

use crate::error::{Result, ATTACH_EXIT_CODE};

use std::path::Path;

/// Record the session to attach.
///
/// # Errors
///
/// Returns an error if the file or its directory cannot be written.
pub fn write_attach_target(file: &Path, session: &str) -> Result<()> {
    if let Some(dir) = file.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(file, format!("{session}\n"))?;
    Ok(())
}

/// Shell function wrapping the `pd` binary.
#[must_use]
pub fn shell_init_script(attach_file: &Path) -> String {
    let file = attach_file.display();
    format!(
        r#"# Prime Directive shell integration. Add to your shell rc:
#   eval "$(pd shell-init)"
pd() {{
    command pd "$@"
    local pd_status=$?
    if [ "$pd_status" -eq {ATTACH_EXIT_CODE} ] && [ -f "{file}" ]; then
        local pd_session
        pd_session="$(cat "{file}")"
        rm -f "{file}"
        tmux attach-session -t "$pd_session"
        return $?
    fi
    return $pd_status
}}
"#
    )
}
