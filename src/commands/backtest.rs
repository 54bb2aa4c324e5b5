//! Backtest command implementation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::info;

use stock_strategies::data::{self, CsvDataProvider, MarketDataProvider};
use stock_strategies::{BacktestResult, Backtester, Config};

pub fn run(
    config_path: String,
    capital_override: Option<f64>,
    start_override: Option<String>,
    end_override: Option<String>,
) -> Result<()> {
    info!("Starting backtest");

    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(capital) = capital_override {
        info!("Overriding initial capital to: {:.2}", capital);
        config.trading.capital = capital;
    }

    let start_date: Option<DateTime<Utc>> = start_override
        .as_ref()
        .map(|s| data::parse_date(s))
        .transpose()?;
    let end_date: Option<DateTime<Utc>> = end_override
        .as_ref()
        .map(|s| data::parse_date(s))
        .transpose()?;

    if let Some(start) = start_date {
        config.trading.start = Some(start);
    }
    if let Some(end) = end_date {
        config.trading.end = Some(end);
    }

    let timeframe = config
        .timeframe()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid timeframe in config")?;

    let provider = CsvDataProvider::new(&config.backtest.data_dir);
    let candles = provider.get_historical_candles(
        &config.symbol(),
        timeframe,
        config.trading.start,
        config.trading.end,
    )?;

    let results_dir = config.backtest.results_dir.clone();
    let symbol = config.trading.symbol.clone();

    let mut backtester = Backtester::from_config(config);
    let result = backtester.run(&candles)?;

    print_summary(&result);
    persist_result(&results_dir, &symbol, &result)?;

    info!("Backtest completed");
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Initial Capital:    {:.2}", result.initial_capital);
    println!("Final Capital:      {:.2}", result.final_capital);
    println!("Total Return:       {:.2} ({:.2}%)", result.total_return, result.total_return_pct);
    println!("Max Drawdown:       {:.2}%", result.max_drawdown * 100.0);
    println!("Sharpe Ratio:       {:.2}", result.sharpe_ratio);
    println!("Win Rate:           {:.2}%", result.win_rate);
    println!("Profit Factor:      {:.2}", result.profit_factor);
    println!("Total Trades:       {}", result.total_trades);
    println!("Winning Trades:     {}", result.winning_trades);
    println!("Losing Trades:      {}", result.losing_trades);
    println!("Average Win:        {:.2}", result.avg_win);
    println!("Average Loss:       {:.2}", result.avg_loss);
    println!("Largest Win:        {:.2}", result.max_win);
    println!("Largest Loss:       {:.2}", result.max_loss);
    println!("Termination:        {:?}", result.termination);
    println!("{}", "=".repeat(60));
}

fn persist_result(results_dir: &str, symbol: &str, result: &BacktestResult) -> Result<()> {
    std::fs::create_dir_all(results_dir).context("Failed to create results directory")?;

    let first_ts = result
        .equity_curve
        .first()
        .map(|p| p.timestamp.format("%Y%m%d").to_string())
        .unwrap_or_else(|| "empty".to_string());
    let path = Path::new(results_dir).join(format!("{}_{}.json", symbol, first_ts));

    let json = serde_json::to_string_pretty(result).context("Failed to serialize result")?;
    std::fs::write(&path, json).context("Failed to write result file")?;

    info!("Result written to {}", path.display());
    Ok(())
}
