//! EMA-Gap-ATR configuration

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Configuration for the EMA-Gap-ATR strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmaGapAtrConfig {
    /// Fast EMA period (default: 9)
    #[serde(default = "default_ema_fast")]
    pub ema_fast: usize,

    /// Slow EMA period (default: 21)
    #[serde(default = "default_ema_slow")]
    pub ema_slow: usize,

    /// ATR period used to normalize the EMA gap (default: 14)
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// RSI period (default: 14)
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// Minimum |fast - slow| / ATR for an entry (default: 0.6)
    #[serde(default = "default_atr_multiplier_entry")]
    pub atr_multiplier_entry: f64,

    /// Gap / ATR level below which open positions unwind (default: 0.3)
    #[serde(default = "default_atr_multiplier_unwind")]
    pub atr_multiplier_unwind: f64,

    /// Minimum RSI for a long entry (default: 48)
    #[serde(default = "default_rsi_entry_long")]
    pub rsi_entry_long: f64,

    /// Maximum RSI for a short entry (default: 52)
    #[serde(default = "default_rsi_entry_short")]
    pub rsi_entry_short: f64,

    /// Long positions exit when RSI falls below this (default: 45)
    #[serde(default = "default_rsi_exit_long")]
    pub rsi_exit_long: f64,

    /// Short positions exit when RSI rises above this (default: 55)
    #[serde(default = "default_rsi_exit_short")]
    pub rsi_exit_short: f64,

    /// Session open gap (%) that qualifies for the gap-open entry
    /// (default: 0.3)
    #[serde(default = "default_gap_threshold_pct")]
    pub gap_threshold_pct: f64,

    /// Minimum body/range ratio for the gap-open candle (default: 0.6)
    #[serde(default = "default_strong_candle_threshold")]
    pub strong_candle_threshold: f64,

    /// Session open time of day; enables the gap-open entry variant
    #[serde(default)]
    pub market_open_time: Option<NaiveTime>,
}

fn default_ema_fast() -> usize {
    9
}
fn default_ema_slow() -> usize {
    21
}
fn default_atr_period() -> usize {
    14
}
fn default_rsi_period() -> usize {
    14
}
fn default_atr_multiplier_entry() -> f64 {
    0.6
}
fn default_atr_multiplier_unwind() -> f64 {
    0.3
}
fn default_rsi_entry_long() -> f64 {
    48.0
}
fn default_rsi_entry_short() -> f64 {
    52.0
}
fn default_rsi_exit_long() -> f64 {
    45.0
}
fn default_rsi_exit_short() -> f64 {
    55.0
}
fn default_gap_threshold_pct() -> f64 {
    0.3
}
fn default_strong_candle_threshold() -> f64 {
    0.6
}

impl Default for EmaGapAtrConfig {
    fn default() -> Self {
        Self {
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            atr_period: default_atr_period(),
            rsi_period: default_rsi_period(),
            atr_multiplier_entry: default_atr_multiplier_entry(),
            atr_multiplier_unwind: default_atr_multiplier_unwind(),
            rsi_entry_long: default_rsi_entry_long(),
            rsi_entry_short: default_rsi_entry_short(),
            rsi_exit_long: default_rsi_exit_long(),
            rsi_exit_short: default_rsi_exit_short(),
            gap_threshold_pct: default_gap_threshold_pct(),
            strong_candle_threshold: default_strong_candle_threshold(),
            market_open_time: None,
        }
    }
}

impl EmaGapAtrConfig {
    /// Longest indicator period referenced
    pub fn max_period(&self) -> usize {
        self.ema_fast
            .max(self.ema_slow)
            .max(self.atr_period)
            .max(self.rsi_period)
    }
}
