//! Configuration management
//!
//! Run configuration is a single JSON document: common trading parameters,
//! a tagged strategy section, and engine settings. Configurations are
//! immutable for the duration of a run.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::strategies::ema_gap_atr::EmaGapAtrConfig;
use crate::strategies::price_action::PriceActionConfig;
use crate::strategies::trend_following::TrendFollowingConfig;
use crate::types::{Symbol, Timeframe};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub trading: TradingConfig,
    pub strategy: StrategyParams,
    #[serde(default)]
    pub backtest: BacktestSettings,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        Ok(config)
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.trading.symbol)
    }

    /// Parse the configured timeframe; callers validate the raw string first.
    pub fn timeframe(&self) -> Result<Timeframe, String> {
        self.trading.timeframe.parse()
    }
}

/// Exit ordering when several same-direction trades are closed by one signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitMode {
    Fifo,
    Lifo,
}

/// Trailing stop offset style
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrailingMode {
    /// Offset = multiplier * ATR at entry
    Atr { multiplier: f64 },
    /// Offset = pct % of the favorable extreme
    Percent { pct: f64 },
}

/// Trailing stop configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingStopConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Unrealized profit (in %) required before the stop activates
    #[serde(default = "default_trailing_activation")]
    pub activation_profit_pct: f64,
    #[serde(default = "default_trailing_mode")]
    pub mode: TrailingMode,
}

impl Default for TrailingStopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            activation_profit_pct: default_trailing_activation(),
            mode: default_trailing_mode(),
        }
    }
}

/// Hard stop evaluated after signal processing each candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopLossMode {
    None,
    /// Exit when unrealized P&L (%) falls to -pct
    Percent { pct: f64 },
    /// Exit when price moves multiplier * ATR-at-entry against the trade
    Atr { multiplier: f64 },
}

impl Default for StopLossMode {
    fn default() -> Self {
        StopLossMode::None
    }
}

/// Common trading parameters shared by every strategy kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub symbol: String,
    pub timeframe: String,

    /// Initial capital in the same currency as the price data.
    #[serde(default = "default_capital")]
    pub capital: f64,

    /// Fixed quantity per entry when dynamic sizing is off
    #[serde(default = "default_position_size")]
    pub position_size: f64,

    /// Capital-protection threshold as a fraction of initial capital
    #[serde(default = "default_max_loss_pct")]
    pub max_loss_pct: f64,

    /// Cap on total open quantity when pyramiding is enabled
    #[serde(default = "default_max_lots")]
    pub max_lots: f64,

    #[serde(default = "default_exit_mode")]
    pub exit_mode: ExitMode,

    #[serde(default)]
    pub pyramiding_enabled: bool,

    /// Intraday square-off time; all trades exit at the first candle at or
    /// after this time of day
    #[serde(default)]
    pub mis_exit_time: Option<NaiveTime>,

    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    /// Largest fraction of capital a single entry may consume
    #[serde(default = "default_max_trade_pct")]
    pub max_trade_pct: f64,

    #[serde(default)]
    pub dynamic_position_sizing: bool,

    /// Lower bound on dynamically computed quantities
    #[serde(default = "default_base_position_size")]
    pub base_position_size: f64,

    /// Drawdown fraction that trips the circuit breaker
    #[serde(default = "default_max_drawdown_threshold")]
    pub max_drawdown_threshold: f64,

    /// Exit trades whose unrealized P&L (%) reaches this target
    #[serde(default)]
    pub profit_target_pct: Option<f64>,

    #[serde(default)]
    pub stop_loss: StopLossMode,

    #[serde(default)]
    pub trailing: TrailingStopConfig,
}

fn default_capital() -> f64 {
    100_000.0
}
fn default_position_size() -> f64 {
    1.0
}
fn default_max_loss_pct() -> f64 {
    0.02
}
fn default_max_lots() -> f64 {
    5.0
}
fn default_exit_mode() -> ExitMode {
    ExitMode::Fifo
}
fn default_max_trade_pct() -> f64 {
    0.25
}
fn default_base_position_size() -> f64 {
    1.0
}
fn default_max_drawdown_threshold() -> f64 {
    0.5
}
fn default_trailing_activation() -> f64 {
    1.0
}
fn default_trailing_mode() -> TrailingMode {
    TrailingMode::Atr { multiplier: 2.0 }
}

/// Engine settings (directories, reporting)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            results_dir: default_results_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_results_dir() -> String {
    "results".to_string()
}

/// Strategy selector with its parameter payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyParams {
    EmaGapAtr(EmaGapAtrConfig),
    TrendFollowing(TrendFollowingConfig),
    PriceAction(PriceActionConfig),
}

impl StrategyParams {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyParams::EmaGapAtr(_) => "ema_gap_atr",
            StrategyParams::TrendFollowing(_) => "trend_following",
            StrategyParams::PriceAction(_) => "price_action",
        }
    }

    /// Maximum indicator period the strategy references; drives warm-up.
    pub fn max_indicator_period(&self) -> usize {
        match self {
            StrategyParams::EmaGapAtr(c) => c.max_period(),
            StrategyParams::TrendFollowing(c) => c.max_period(),
            StrategyParams::PriceAction(c) => c.max_period(),
        }
    }
}
