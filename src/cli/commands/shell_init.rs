//! Shell-init command implementation.

use crate::config::attach_target_path;
use crate::error::{Error, Result};
use crate::workspace::attach::shell_init_script;

/// Print the `pd` shell wrapper.
///
/// # Errors
///
/// Returns `Config` if the home directory cannot be determined.
pub fn execute() -> Result<()> {
    let file = attach_target_path()
        .ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    print!("{}", shell_init_script(&file));
    Ok(())
}
