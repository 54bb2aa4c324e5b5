//! Stock trading strategies - main entry point
//!
//! This binary provides three subcommands:
//! - backtest: Run a strategy backtest over CSV data
//! - validate: Run the validation and safety gate on a configuration
//! - sweep: Backtest every config in a directory in parallel and rank them

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "stock-strategies")]
#[command(about = "Rule-based stock trading strategies with deterministic backtesting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a strategy backtest
    Backtest {
        /// Path to configuration file
        #[arg(short, long)]
        config: String,

        /// Initial capital (overrides config file)
        #[arg(long)]
        capital: Option<f64>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },

    /// Validate a configuration and print the safety report
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: String,
    },

    /// Backtest every config file in a directory and rank the results
    Sweep {
        /// Directory containing configuration files
        #[arg(short, long)]
        dir: String,

        /// Sort results by metric (sharpe, return, drawdown, win_rate,
        /// profit_factor)
        #[arg(long, default_value = "sharpe")]
        sort_by: String,

        /// Number of top results to show
        #[arg(short, long, default_value = "10")]
        top: usize,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    if file_only {
        // Sweep logs to file only, keeping the console clean for progress
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        info!("Logging initialized");
        info!("Log file: {}", log_path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (command_name, file_only) = match &cli.command {
        Commands::Backtest { .. } => ("backtest", false),
        Commands::Validate { .. } => ("validate", false),
        Commands::Sweep { .. } => ("sweep", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Backtest {
            config,
            capital,
            start,
            end,
        } => commands::backtest::run(config, capital, start, end),

        Commands::Validate { config } => commands::validate::run(config),

        Commands::Sweep { dir, sort_by, top } => commands::sweep::run(dir, sort_by, top),
    }
}
