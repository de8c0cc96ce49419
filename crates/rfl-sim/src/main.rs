//! rfld - RF channel selection driver
//!
//! Senses the spectrum at a fixed interval, lets a Q-learning agent and a
//! random baseline pick a channel for every reading, and reports how the
//! two compare.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::struct_excessive_bools)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rfl_core::util::load_env_file;
use rfl_sim::config::LogConfig;
use rfl_sim::{Config, RunOverrides, Runner, SourceKind};

#[derive(Parser)]
#[command(name = "rfld")]
#[command(author, version, about = "RF channel selection learning driver", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $RFL_CONFIG, ./rfl.toml, ~/.config/rfl/rfl.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the learner against the random baseline
    Run(RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args)]
struct RunArgs {
    /// Maximum number of episodes (0 = no limit)
    #[arg(long)]
    episodes: Option<u64>,

    /// Maximum runtime in seconds (0 = no limit)
    #[arg(long)]
    time: Option<u64>,

    /// Resume from the saved Q-table
    #[arg(long)]
    load_snapshot: bool,

    /// Q-table file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Write a JSON run report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Seed both agents and the simulated spectrum
    #[arg(long)]
    seed: Option<u64>,

    /// Spectrum source
    #[arg(long, value_enum)]
    source: Option<SourceKind>,

    /// JSON-lines power trace (implies --source replay)
    #[arg(long)]
    replay_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl From<RunArgs> for RunOverrides {
    fn from(args: RunArgs) -> Self {
        Self {
            episodes: args.episodes,
            time: args.time,
            load_snapshot: args.load_snapshot,
            snapshot: args.snapshot,
            report: args.report,
            seed: args.seed,
            source: args.source,
            replay_file: args.replay_file,
            verbose: args.verbose,
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a configuration file with default values
    Init {
        /// Destination file
        #[arg(default_value = "rfl.toml")]
        path: PathBuf,
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from rfl.env file (before parsing args)
    let env_file = load_env_file();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let config_file = Config::locate(cli.config.as_deref())?;
            let mut config = Config::build(config_file.as_deref(), None)?;
            config.apply(&args.into());
            config.validate()?;

            let _guard = init_tracing(&config.log);
            if let Some(path) = env_file {
                info!("Loaded environment from {}", path.display());
            }
            match &config_file {
                Some(path) => info!("Loaded config from {}", path.display()),
                None => info!("No config file found, using defaults"),
            }
            run(config).await
        }
        Commands::Config(ConfigCommands::Show) => {
            let config = Config::load(cli.config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Config(ConfigCommands::Init { path, force }) => init_config(&path, force),
    }
}

async fn run(config: Config) -> Result<()> {
    info!("Starting rfld v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded: {} channels, threshold {} dB, source {}",
        config.agent.num_channels, config.agent.power_threshold_db, config.spectrum.source
    );
    println!("Press Ctrl+C to stop early");

    let runner = Runner::new(config).context("Failed to start run")?;
    let report = runner.run(shutdown_signal()).await.inspect_err(|e| {
        error!("Run failed: {:#}", e);
    })?;

    info!("rfld stopped: {}", report.stop_reason);
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    std::fs::write(path, Config::default().to_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

/// Install the global subscriber; the returned guard flushes the log file
fn init_tracing(log: &LogConfig) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("rfld={0},rfl_sim={0},rfl_rl={0}", log.level).into());

    if log.file.is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return None;
    }

    let log_path = Path::new(&log.file);
    let log_dir = log_path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let log_filename = log_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("rfld.log");

    // Create the directory and check it is writable
    let can_write = (|| -> std::io::Result<()> {
        if !log_dir.exists() {
            std::fs::create_dir_all(log_dir)?;
        }
        let test_path = log_dir.join(".write_test");
        std::fs::write(&test_path, "test")?;
        std::fs::remove_file(&test_path)?;
        Ok(())
    })();

    match can_write {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                .init();
            info!("Logging to file: {}", log.file);
            Some(guard)
        }
        Err(e) => {
            // Fall back to stdout-only logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            warn!(
                "Could not set up file logging to '{}': {}. Using stdout only.",
                log.file, e
            );
            None
        }
    }
}

/// Wait for shutdown signal (SIGINT, SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}. Using fallback.", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}. Using Ctrl+C only.", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        () = terminate => {
            info!("Received SIGTERM");
        }
    }
}
