//! Trend-following configuration

use serde::{Deserialize, Serialize};

/// Configuration for the trend-following strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendFollowingConfig {
    /// DEMA period for trend direction (default: 20)
    #[serde(default = "default_dema_period")]
    pub dema_period: usize,

    /// Supertrend ATR period (default: 10)
    #[serde(default = "default_supertrend_period")]
    pub supertrend_period: usize,

    /// Supertrend ATR multiplier (default: 3.0)
    #[serde(default = "default_supertrend_multiplier")]
    pub supertrend_multiplier: f64,

    /// Optional entry filter: require |close - DEMA| / close at or above
    /// this fraction
    #[serde(default)]
    pub min_trend_strength: Option<f64>,

    /// Window for the volatility filter's return std-dev (default: 20)
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,

    /// Optional entry filter: reject entries when the return std-dev over
    /// the volatility window exceeds this cap
    #[serde(default)]
    pub volatility_cap: Option<f64>,
}

fn default_dema_period() -> usize {
    20
}
fn default_supertrend_period() -> usize {
    10
}
fn default_supertrend_multiplier() -> f64 {
    3.0
}
fn default_volatility_window() -> usize {
    20
}

impl Default for TrendFollowingConfig {
    fn default() -> Self {
        Self {
            dema_period: default_dema_period(),
            supertrend_period: default_supertrend_period(),
            supertrend_multiplier: default_supertrend_multiplier(),
            min_trend_strength: None,
            volatility_window: default_volatility_window(),
            volatility_cap: None,
        }
    }
}

impl TrendFollowingConfig {
    /// Longest indicator period referenced
    pub fn max_period(&self) -> usize {
        let mut period = self.dema_period.max(self.supertrend_period);
        if self.volatility_cap.is_some() {
            period = period.max(self.volatility_window);
        }
        period
    }
}
