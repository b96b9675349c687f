//! Prime Directive CLI entry point.

use clap::Parser;
use pd::cli::commands::{self, AppContext};
use pd::cli::{Cli, Commands};
use pd::config::{load_config, load_dotenv, resolve_log_path, PrimeConfig};
use pd::error::{Error, ATTACH_EXIT_CODE};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    load_dotenv();

    let config = load_config(cli.config.as_deref());
    let log_path = config
        .as_ref()
        .ok()
        .and_then(|c| resolve_log_path(&c.system));
    init_tracing(cli.verbose, cli.quiet, log_path.as_deref());

    match run(&cli, config, cli.json) {
        Ok(code) => code,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if let Some(hint) = e.hint() {
                eprintln!("Error: {e}\n  Hint: {hint}");
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool, log_path: Option<&Path>) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter, Layer};

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,hyper=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    let stderr_layer = (!quiet).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_filter(filter)
    });

    let mut file_error = None;
    let file_layer = log_path.and_then(|path| match open_log_file(path) {
        Ok(file) => Some(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_filter(LevelFilter::INFO),
        ),
        Err(e) => {
            file_error = Some(format!("{}: {e}", path.display()));
            None
        }
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(err) = file_error {
        tracing::warn!("Could not open log file {err}; logging to stderr only");
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::OpenOptions::new().create(true).append(true).open(path)
}

fn context(cli: &Cli, config: Result<PrimeConfig, Error>) -> Result<AppContext, Error> {
    AppContext::new(config?, cli.db.as_deref(), cli.mock)
}

fn run(cli: &Cli, config: Result<PrimeConfig, Error>, json: bool) -> Result<ExitCode, Error> {
    tracing::info!(command = ?cli.command, "Command");

    match &cli.command {
        Commands::Version => commands::version::execute(json)?,
        Commands::Completions { shell } => commands::completions::execute(shell)?,
        Commands::ShellInit => commands::shell_init::execute()?,

        Commands::Freeze(args) => commands::freeze::execute(&context(cli, config)?, args, json)?,
        Commands::Switch { repo } => {
            if commands::switch::execute(&context(cli, config)?, repo, json)? {
                return Ok(ExitCode::from(ATTACH_EXIT_CODE));
            }
        }

        Commands::List => commands::list::execute(&context(cli, config)?, json)?,
        Commands::Status => commands::status::execute(&context(cli, config)?, json)?,
        Commands::Doctor => commands::doctor::execute(&context(cli, config)?, json)?,
        Commands::Sitrep { repo, limit } => {
            commands::sitrep::execute(&context(cli, config)?, repo, *limit, json)?;
        }
        Commands::Metrics { repo } => {
            commands::metrics::execute(&context(cli, config)?, repo.as_deref(), json)?;
        }
        Commands::AiUsage => commands::ai_usage::execute(&context(cli, config)?, json)?,

        // Hooks
        Commands::InstallHooks { repo } => {
            commands::hooks::execute(&context(cli, config)?, repo.as_deref(), json)?;
        }
        Commands::RecordCommit { repo } => {
            commands::record_commit::execute(&context(cli, config)?, repo)?;
        }

        Commands::Daemon {
            interval,
            inactivity_limit,
        } => commands::daemon::execute(&context(cli, config)?, *interval, *inactivity_limit)?,
    }

    Ok(ExitCode::SUCCESS)
}
