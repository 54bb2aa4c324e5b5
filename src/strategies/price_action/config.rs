//! Price-action configuration

use serde::{Deserialize, Serialize};

/// Configuration for the price-action strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceActionConfig {
    /// Supertrend ATR period (default: 10)
    #[serde(default = "default_supertrend_period")]
    pub supertrend_period: usize,

    /// Supertrend ATR multiplier (default: 3.0)
    #[serde(default = "default_supertrend_multiplier")]
    pub supertrend_multiplier: f64,

    /// MACD fast EMA period (default: 12)
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    /// MACD slow EMA period (default: 26)
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    /// MACD signal EMA period (default: 9)
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,

    /// Both confirmations must land within this many candles of each other
    /// (default: 2)
    #[serde(default = "default_confirmation_window")]
    pub confirmation_window_candles: usize,
}

fn default_supertrend_period() -> usize {
    10
}
fn default_supertrend_multiplier() -> f64 {
    3.0
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}
fn default_confirmation_window() -> usize {
    2
}

impl Default for PriceActionConfig {
    fn default() -> Self {
        Self {
            supertrend_period: default_supertrend_period(),
            supertrend_multiplier: default_supertrend_multiplier(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            confirmation_window_candles: default_confirmation_window(),
        }
    }
}

impl PriceActionConfig {
    /// Longest indicator period referenced; the MACD signal line needs the
    /// slow EMA plus its own smoothing.
    pub fn max_period(&self) -> usize {
        self.supertrend_period
            .max(self.macd_slow + self.macd_signal)
    }
}
