//! Configuration management.
//!
//! This module resolves the Prime Directive directories, the registry file
//! and the database path, and loads the registry once per invocation.
//!
//! # Layout
//!
//! Everything lives under `~/.prime-directive/`:
//! - **Registry**: `config.yaml` (repos + system settings)
//! - **Database**: `data/prime.db`
//! - **Logs**: `logs/pd.log`
//! - **Attach handoff**: `run/attach_target` (read by the shell wrapper)

mod registry;

pub use registry::{
    parse_config, AiProviderKind, FallbackProvider, PrimeConfig, RepoConfig, SystemConfig,
};

use crate::error::{Error, Result};

use std::path::{Component, Path, PathBuf};

/// Name of the per-user directory.
const APP_DIR: &str = ".prime-directive";

/// Environment variable holding the hosted provider credential.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Get the global Prime Directive directory (`~/.prime-directive`).
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(APP_DIR))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf())
}

/// Load `.env` files before anything reads the environment.
///
/// Order: current directory first, then `~/.prime-directive/.env`.
/// `dotenv` never overrides variables that are already set, so the first
/// file to define a key wins.
pub fn load_dotenv() {
    let _ = dotenv::dotenv();
    if let Some(dir) = global_dir() {
        let _ = dotenv::from_path(dir.join(".env"));
    }
}

/// Resolve the registry file path.
///
/// Priority:
/// 1. Explicit `--config` flag
/// 2. `PD_CONFIG` environment variable
/// 3. `~/.prime-directive/config.yaml`
#[must_use]
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("PD_CONFIG") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    global_dir().map(|dir| dir.join("config.yaml"))
}

/// Load the registry.
///
/// A missing file yields the defaults (no repositories); a malformed file
/// is a configuration error.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(explicit_path: Option<&Path>) -> Result<PrimeConfig> {
    let Some(path) = resolve_config_path(explicit_path) else {
        return Ok(PrimeConfig::default());
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(PrimeConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| Error::ConfigFile {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let base_dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let mut config = parse_config(&content, &base_dir).map_err(|e| Error::ConfigFile {
        path: path.clone(),
        message: match e {
            Error::Config(message) => message,
            other => other.to_string(),
        },
    })?;

    if env_flag("PD_MOCK_MODE") {
        config.system.mock_mode = true;
    }

    Ok(config)
}

/// Resolve the database path.
///
/// Priority:
/// 1. Explicit `--db` flag
/// 2. `PD_DB` environment variable
/// 3. `system.db_path` from the registry
/// 4. `~/.prime-directive/data/prime.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>, system: &SystemConfig) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("PD_DB") {
        if !db_path.trim().is_empty() {
            return Some(expand_tilde(&db_path));
        }
    }

    if let Some(ref path) = system.db_path {
        return Some(path.clone());
    }

    global_dir().map(|dir| dir.join("data").join("prime.db"))
}

/// Resolve the log file path (`system.log_path` or the default location).
#[must_use]
pub fn resolve_log_path(system: &SystemConfig) -> Option<PathBuf> {
    system
        .log_path
        .clone()
        .or_else(|| global_dir().map(|dir| dir.join("logs").join("pd.log")))
}

/// Path of the attach handoff file consumed by the shell wrapper.
#[must_use]
pub fn attach_target_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("run").join("attach_target"))
}

/// Read the hosted-provider API key from the environment.
#[must_use]
pub fn resolve_openai_api_key() -> Option<String> {
    std::env::var(OPENAI_API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

/// Whether the process is running inside a tmux client.
#[must_use]
pub fn inside_tmux() -> bool {
    std::env::var("TMUX").is_ok_and(|v| !v.is_empty())
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
}

/// Interpret a flag value: empty, `0` and `false` are off.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Expand a leading `~` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Lexically normalize a path: drop `.`, fold `..`, strip trailing separators.
///
/// No filesystem access, so symlinks are not resolved.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_path_with_explicit() {
        let explicit = PathBuf::from("/custom/registry.yaml");
        assert_eq!(resolve_config_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/prime.db");
        let result = resolve_db_path(Some(&explicit), &SystemConfig::default());
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_global_dir_returns_some() {
        let dir = global_dir().unwrap();
        assert!(dir.ends_with(".prime-directive"));
    }

    #[test]
    fn test_load_config_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = load_config(Some(&tmp.path().join("absent.yaml"))).unwrap();
        assert!(config.repos.is_empty());
        assert_eq!(config.system.editor_cmd, "windsurf");
    }

    #[test]
    fn test_load_config_malformed_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");
        std::fs::write(&path, "repos: [unclosed").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("FALSE"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c/")), PathBuf::from("/a/c"));
        assert_eq!(normalize_path(Path::new("/a/b")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/srv/repo"), PathBuf::from("/srv/repo"));
    }
}
