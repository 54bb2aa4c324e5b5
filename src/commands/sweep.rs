//! Sweep command: backtest every config in a directory in parallel
//!
//! Runs are fully independent (own book, equity curve, evaluator state), so
//! they parallelize across workers without shared state.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::warn;

use stock_strategies::data::{CsvDataProvider, MarketDataProvider};
use stock_strategies::{BacktestResult, Backtester, Config};

struct SweepRow {
    name: String,
    sharpe: f64,
    total_return_pct: f64,
    max_drawdown: f64,
    win_rate: f64,
    profit_factor: f64,
    total_trades: usize,
}

impl SweepRow {
    fn from_result(name: String, result: &BacktestResult) -> Self {
        Self {
            name,
            sharpe: result.sharpe_ratio,
            total_return_pct: result.total_return_pct,
            max_drawdown: result.max_drawdown,
            win_rate: result.win_rate,
            profit_factor: result.profit_factor,
            total_trades: result.total_trades,
        }
    }

    fn metric(&self, sort_by: &str) -> f64 {
        match sort_by {
            "return" => self.total_return_pct,
            // Smaller drawdown ranks higher
            "drawdown" => -self.max_drawdown,
            "win_rate" => self.win_rate,
            "profit_factor" => self.profit_factor,
            _ => self.sharpe,
        }
    }
}

fn run_one(path: &PathBuf) -> Result<SweepRow> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let config = Config::from_file(path)?;
    let timeframe = config.timeframe().map_err(|e| anyhow::anyhow!(e))?;

    let provider = CsvDataProvider::new(&config.backtest.data_dir);
    let candles = provider.get_historical_candles(
        &config.symbol(),
        timeframe,
        config.trading.start,
        config.trading.end,
    )?;

    let mut backtester = Backtester::from_config(config);
    let result = backtester.run(&candles)?;
    Ok(SweepRow::from_result(name, &result))
}

pub fn run(dir: String, sort_by: String, top: usize) -> Result<()> {
    let mut config_paths: Vec<PathBuf> = std::fs::read_dir(&dir)
        .with_context(|| format!("Failed to read config directory: {}", dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    config_paths.sort();

    if config_paths.is_empty() {
        anyhow::bail!("No .json config files found in {}", dir);
    }

    println!("Sweeping {} configurations...", config_paths.len());

    let progress = ProgressBar::new(config_paths.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut rows: Vec<SweepRow> = config_paths
        .par_iter()
        .filter_map(|path| {
            let row = match run_one(path) {
                Ok(row) => Some(row),
                Err(err) => {
                    warn!(config = %path.display(), %err, "Sweep run failed");
                    None
                }
            };
            progress.inc(1);
            row
        })
        .collect();
    progress.finish_and_clear();

    rows.sort_by(|a, b| {
        b.metric(&sort_by)
            .partial_cmp(&a.metric(&sort_by))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    println!("\n{}", "=".repeat(96));
    println!(
        "{:<28} {:>8} {:>10} {:>10} {:>9} {:>13} {:>8}",
        "CONFIG", "SHARPE", "RETURN%", "MAX DD%", "WIN%", "PROFIT FACTOR", "TRADES"
    );
    println!("{}", "-".repeat(96));
    for row in rows.iter().take(top) {
        println!(
            "{:<28} {:>8.2} {:>10.2} {:>10.2} {:>9.2} {:>13.2} {:>8}",
            row.name,
            row.sharpe,
            row.total_return_pct,
            row.max_drawdown * 100.0,
            row.win_rate,
            row.profit_factor,
            row.total_trades
        );
    }
    println!("{}", "=".repeat(96));

    Ok(())
}
