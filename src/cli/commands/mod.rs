//! Command implementations.

pub mod ai_usage;
pub mod completions;
pub mod daemon;
pub mod doctor;
pub mod freeze;
pub mod hooks;
pub mod list;
pub mod metrics;
pub mod record_commit;
pub mod shell_init;
pub mod sitrep;
pub mod status;
pub mod switch;
pub mod version;

use crate::config::{resolve_db_path, PrimeConfig};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;

use std::path::{Path, PathBuf};

/// Registry and database location for one invocation.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: PrimeConfig,
    pub db_path: PathBuf,
}

impl AppContext {
    /// Apply the global `--db` / `--mock` flags to a loaded registry.
    ///
    /// # Errors
    ///
    /// Returns `Config` if no database location can be determined.
    pub fn new(mut config: PrimeConfig, db_flag: Option<&Path>, mock: bool) -> Result<Self> {
        if mock {
            config.system.mock_mode = true;
        }
        let db_path = resolve_db_path(db_flag, &config.system).ok_or_else(|| {
            Error::Config("Cannot determine a database path; pass --db or set PD_DB".to_string())
        })?;
        Ok(Self { config, db_path })
    }

    #[must_use]
    pub fn mock(&self) -> bool {
        self.config.system.mock_mode
    }

    /// Open the snapshot store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open_storage(&self) -> Result<SqliteStorage> {
        SqliteStorage::open(&self.db_path)
    }
}

/// Runtime for the async parts of a command.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))
}

/// Print `value` as one line of JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
