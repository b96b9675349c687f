//! Error types for the Prime Directive CLI.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (1=repo/internal, 2=db, 4=validation, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! AI provider failures during a freeze do not surface here; the SITREP
//! generator folds them into a [`crate::sitrep::SitrepOutcome`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Prime Directive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code reserved for "switch succeeded, the calling shell must now
/// attach to the target tmux session".
///
/// The wrapper printed by `pd shell-init` watches for this code.
pub const ATTACH_EXIT_CODE: u8 = 88;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Repository / internal (exit 1)
    RepoNotFound,
    InternalError,

    // Database (exit 2)
    DatabaseError,

    // Validation (exit 4)
    InvalidArgument,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::RepoNotFound => "REPO_NOT_FOUND",
            Self::InternalError => "INTERNAL_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::RepoNotFound | Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::InvalidArgument => 4,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same command could plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Prime Directive operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Repository '{id}' not found in configuration.")]
    RepoNotFound {
        id: String,
        /// Configured repository ids, for the hint.
        available: Vec<String>,
    },

    #[error("Repository '{id}' is not registered in the snapshot store")]
    RepoNotRegistered { id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load config {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a `RepoNotFound` carrying the configured ids for hinting.
    #[must_use]
    pub fn repo_not_found<'a>(id: &str, available: impl IntoIterator<Item = &'a String>) -> Self {
        Self::RepoNotFound {
            id: id.to_string(),
            available: available.into_iter().cloned().collect(),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::RepoNotFound { .. } => ErrorCode::RepoNotFound,
            Self::RepoNotRegistered { .. } | Self::Database(_) => ErrorCode::DatabaseError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) | Self::ConfigFile { .. } => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::RepoNotFound { available, .. } => {
                if available.is_empty() {
                    Some(
                        "No repositories configured. \
                         Add them under `repos:` in ~/.prime-directive/config.yaml"
                            .to_string(),
                    )
                } else {
                    Some(format!("Configured repositories: {}", available.join(", ")))
                }
            }
            Self::RepoNotRegistered { id } => Some(format!(
                "Run `pd freeze {id} --note ...` once to register it."
            )),
            Self::ConfigFile { path, .. } => Some(format!(
                "Check the YAML syntax in {}",
                path.display()
            )),
            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
