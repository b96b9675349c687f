//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Prime Directive - freeze, switch and resume work across repositories
#[derive(Parser, Debug)]
#[command(name = "pd", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Registry file (default: $PD_CONFIG or ~/.prime-directive/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (default: $PD_DB, system.db_path, or ~/.prime-directive/data/prime.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Skip git, tmux, editor and AI calls
    #[arg(long, global = true)]
    pub mock: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Snapshot a repository's context and generate a SITREP
    Freeze(FreezeArgs),

    /// Freeze the current repository and warp to another
    Switch {
        /// Target repository id
        repo: String,
    },

    /// List configured repositories by priority
    List,

    /// Git state and last snapshot for every repository
    Status,

    /// Check tmux, editor, AI backends and repository paths
    Doctor,

    /// Show snapshot history for a repository
    Sitrep {
        /// Repository id
        repo: String,

        /// Number of snapshots to show
        #[arg(long, short = 'l', default_value_t = 5)]
        limit: usize,
    },

    /// Time from switching into a repository to its next commit
    Metrics {
        /// Only this repository
        repo: Option<String>,
    },

    /// AI usage and spend for the current month
    AiUsage,

    /// Install a git post-commit hook that records commits
    InstallHooks {
        /// Only this repository (default: all)
        repo: Option<String>,
    },

    /// Record a commit event (called by the post-commit hook)
    #[command(hide = true)]
    RecordCommit {
        /// Repository id
        repo: String,
    },

    /// Auto-freeze repositories after a period of inactivity
    Daemon {
        /// Seconds between inactivity checks
        #[arg(long, default_value_t = 300)]
        interval: u64,

        /// Seconds without file activity before a repository is frozen
        #[arg(long, default_value_t = 1800)]
        inactivity_limit: u64,
    },

    /// Print the shell wrapper that attaches tmux after `pd switch`
    ShellInit,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
pub struct FreezeArgs {
    /// Repository id
    pub repo: String,

    /// What you were actually working on
    #[arg(long, short = 'n')]
    pub note: String,

    /// Current objective
    #[arg(long)]
    pub objective: Option<String>,

    /// What is blocking progress
    #[arg(long)]
    pub blocker: Option<String>,

    /// The next concrete step
    #[arg(long)]
    pub next_step: Option<String>,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_freeze_requires_note() {
        assert!(Cli::try_parse_from(["pd", "freeze", "api"]).is_err());

        let args = ["pd", "freeze", "api", "-n", "auth refactor", "--blocker", "CI"];
        let cli = Cli::try_parse_from(args).unwrap();
        let Commands::Freeze(args) = cli.command else {
            panic!("expected freeze");
        };
        assert_eq!(args.note, "auth refactor");
        assert_eq!(args.blocker.as_deref(), Some("CI"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pd", "switch", "web", "--mock", "--json", "-vv"]).unwrap();
        assert!(cli.mock);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }
}
