//! pg-sweep CLI - Time-boxed, priority-ordered PostgreSQL maintenance sweeps.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use pg_sweep::{
    parse_database_list, RunConfig, RunLock, SweepError, SweepStatus, Sweeper,
    EXIT_DATABASES_SKIPPED,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "pg-sweep")]
#[command(about = "Time-boxed, priority-ordered PostgreSQL maintenance sweeps")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of minutes to run before halting [default: 120]
    #[arg(short, long)]
    minutes: Option<u64>,

    /// Comma-separated list of databases to sweep, in the given order
    #[arg(short, long)]
    databases: Option<String>,

    /// Sweep mode: routine or freeze [default: freeze]
    #[arg(long)]
    mode: Option<String>,

    /// Seconds to pause between databases [default: 10]
    #[arg(long)]
    pause: Option<u64>,

    /// Minimum transaction age for freezing [default: 10000000]
    #[arg(long)]
    freeze_age: Option<i64>,

    /// vacuum_cost_delay setting in ms [default: 20]
    #[arg(long)]
    cost_delay: Option<u32>,

    /// vacuum_cost_limit setting [default: 2000]
    #[arg(long)]
    cost_limit: Option<u32>,

    /// Enforce the time budget by bounding each statement with a timeout
    #[arg(long)]
    enforce_time: bool,

    /// Database user
    #[arg(short = 'U', long)]
    user: Option<String>,

    /// Database hostname
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Database port
    #[arg(short, long)]
    port: Option<u16>,

    /// Database password
    #[arg(short = 'w', long)]
    password: Option<String>,

    /// Maintenance database used for cluster-wide queries
    #[arg(long)]
    maintenance_db: Option<String>,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Append logs to a file instead of the terminal
    #[arg(short = 'l', long)]
    log_file: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Dry run: enumerate candidates without vacuuming anything
    #[arg(long)]
    dry_run: bool,

    /// Path to the single-instance lock file
    #[arg(long)]
    lock_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, SweepError> {
    let cli = Cli::parse();

    // Setup logging; the guard flushes the file writer when run() returns
    let _guard = setup_logging(&cli.verbosity, &cli.log_format, cli.log_file.as_deref())?;

    let config = build_config(&cli)?;
    if let Some(ref path) = cli.config {
        info!("Loaded configuration from {:?}", path);
    }

    // One sweep per host at a time; held until exit
    let lock_path = cli.lock_file.clone().unwrap_or_else(RunLock::default_path);
    let _lock = RunLock::acquire(lock_path)?;

    // Setup signal handling for graceful shutdown (SIGINT and SIGTERM)
    let cancel_token = setup_signal_handler().await?;

    let sweeper = Sweeper::new(config);
    let result = sweeper.run(cancel_token, cli.dry_run).await?;

    if cli.output_json {
        println!("{}", result.to_json()?);
    } else {
        let status_msg = match result.status {
            SweepStatus::Completed if cli.dry_run => "Dry run completed!",
            SweepStatus::Completed => "Sweep completed!",
            SweepStatus::DeadlineHalted => "Sweep halted at the time budget.",
            SweepStatus::Cancelled => "Sweep cancelled.",
        };
        println!("\n{}", status_msg);
        println!("  Run ID: {}", result.run_id);
        println!("  Mode: {}", result.mode);
        println!("  Duration: {:.2}s", result.duration_seconds);
        println!(
            "  Databases: {}/{}",
            result.stats.databases_visited, result.databases_total
        );
        println!("  Tables vacuumed: {}", result.stats.tables_processed);
        if !result.stats.failed_tables.is_empty() {
            println!("  Failed tables: {:?}", result.stats.failed_tables);
        }
        if !result.stats.skipped_databases.is_empty() {
            println!("  Skipped databases: {:?}", result.stats.skipped_databases);
        }
    }

    if result.stats.skipped_databases.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_DATABASES_SKIPPED))
    }
}

/// Build the run configuration: the YAML file (when given) supplies the
/// base, command-line flags override it, and the merged result is validated.
fn build_config(cli: &Cli) -> Result<RunConfig, SweepError> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };

    if let Some(minutes) = cli.minutes {
        config.sweep.minutes = minutes;
    }
    if let Some(ref raw) = cli.databases {
        config.sweep.databases = Some(parse_database_list(raw)?);
    }
    if let Some(ref mode) = cli.mode {
        config.sweep.mode = mode.parse()?;
    }
    if let Some(pause) = cli.pause {
        config.sweep.pause_seconds = pause;
    }
    if let Some(age) = cli.freeze_age {
        config.sweep.freeze_min_age = age;
    }
    if let Some(delay) = cli.cost_delay {
        config.sweep.cost_delay_ms = delay;
    }
    if let Some(limit) = cli.cost_limit {
        config.sweep.cost_limit = limit;
    }
    if cli.enforce_time {
        config.sweep.enforce_time = true;
    }
    if let Some(ref user) = cli.user {
        config.connection.user = user.clone();
    }
    if let Some(ref host) = cli.host {
        config.connection.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.connection.port = port;
    }
    if let Some(ref password) = cli.password {
        config.connection.password = Some(password.clone());
    }
    if let Some(ref db) = cli.maintenance_db {
        config.connection.maintenance_db = db.clone();
    }

    config.validate()?;
    Ok(config)
}

fn setup_logging(
    verbosity: &str,
    format: &str,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, SweepError> {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    let guard = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let builder = builder.with_writer(writer).with_ansi(false);
            if format == "json" {
                builder.json().init();
            } else {
                builder.init();
            }
            Some(guard)
        }
        None => {
            if format == "json" {
                builder.json().init();
            } else {
                builder.init();
            }
            None
        }
    };

    Ok(guard)
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM (cron/systemd shutdown).
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
async fn setup_signal_handler() -> Result<CancellationToken, SweepError> {
    let cancel_token = CancellationToken::new();

    // Clone token for each signal handler
    let token_int = cancel_token.clone();
    let token_term = cancel_token.clone();

    // SIGINT handler (Ctrl-C)
    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Stopping the sweep...");
        token_int.cancel();
    });

    // SIGTERM handler (cron/systemd)
    tokio::spawn(async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Stopping the sweep...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only SIGINT/Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler() -> Result<CancellationToken, SweepError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to setup Ctrl-C handler");
        eprintln!("\nReceived Ctrl-C. Stopping the sweep...");
        token.cancel();
    });

    Ok(cancel_token)
}
