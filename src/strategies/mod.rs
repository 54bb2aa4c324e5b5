//! Trading strategy evaluators
//!
//! Each evaluator is a pure function over a candle prefix plus an immutable
//! context snapshot; it returns signals without mutating engine state. The
//! only state an evaluator keeps across calls is its own observation record
//! (used by `price_action`), bounded by the distinct (symbol, timeframe)
//! pairs seen during a run.
//!
//! ## Available strategies
//!
//! - `ema_gap_atr`: EMA crossover with ATR-normalized gap and RSI gating,
//!   plus a session gap-open variant
//! - `trend_following`: DEMA + Supertrend alignment with optional trend
//!   strength and volatility filters
//! - `price_action`: Supertrend + MACD confirmation state machine

pub mod ema_gap_atr;
pub mod price_action;
pub mod trend_following;

use std::collections::HashMap;

use crate::config::{Config, StrategyParams};
use crate::error::StrategyError;
use crate::types::{ActiveTrade, Candle, Signal};

/// Candles appended past the longest indicator period before signals count.
pub const WARMUP_BUFFER: usize = 10;

/// Read-only snapshot handed to evaluators each candle
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub active_trades: &'a [ActiveTrade],
    pub current_balance: f64,
    pub current_lots: f64,
}

impl<'a> EvalContext<'a> {
    pub fn has_open_trades(&self) -> bool {
        !self.active_trades.is_empty()
    }
}

/// Result of evaluating one candle
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub signals: Vec<Signal>,
    /// Named indicator readings for logging and inspection
    pub diagnostics: HashMap<String, f64>,
}

/// Strategy evaluator interface
///
/// `evaluate` receives the candle prefix `[0..=i]`; implementations must not
/// mutate the inputs. Evaluators return no signals while the prefix is
/// shorter than their minimum data requirement.
pub trait StrategyEvaluator: Send {
    fn name(&self) -> &'static str;

    /// Candles consumed before the first signal is considered valid
    /// (longest referenced indicator period plus the stability buffer).
    fn warmup_candles(&self) -> usize;

    fn evaluate(
        &mut self,
        candles: &[Candle],
        ctx: &EvalContext<'_>,
    ) -> Result<Evaluation, StrategyError>;
}

/// Create a strategy evaluator from configuration
pub fn create_strategy(config: &Config) -> Box<dyn StrategyEvaluator> {
    match &config.strategy {
        StrategyParams::EmaGapAtr(params) => Box::new(
            ema_gap_atr::EmaGapAtrStrategy::new(params.clone(), config.symbol()),
        ),
        StrategyParams::TrendFollowing(params) => Box::new(
            trend_following::TrendFollowingStrategy::new(params.clone(), config.symbol()),
        ),
        StrategyParams::PriceAction(params) => Box::new(
            price_action::PriceActionStrategy::new(params.clone(), config.symbol()),
        ),
    }
}
