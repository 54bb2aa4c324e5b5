//! Engine error types
//!
//! Admission failures surface before the first candle is processed; anything
//! recoverable inside the loop (a bad evaluation, a rejected order) is logged
//! and skipped instead of aborting the run.

use thiserror::Error;

use crate::types::CandleValidationError;

/// Fatal errors returned by the backtest orchestrator
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("safety gate blocked the run: {0}")]
    SafetyBlocked(String),

    #[error("no candle data for {symbol} ({timeframe})")]
    NoData { symbol: String, timeframe: String },

    #[error("insufficient data: warm-up needs {need} candles, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("candle {index} violates OHLC invariants: {source}")]
    CandleInvariantViolated {
        index: usize,
        #[source]
        source: CandleValidationError,
    },

    #[error("candle {index} is not in strict timestamp order")]
    CandleOutOfOrder { index: usize },
}

/// Recoverable per-candle evaluation failures; the orchestrator logs these
/// with the candle index and moves on.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("indicator failure: {0}")]
    Indicator(#[from] crate::indicators::IndicatorError),

    #[error("malformed evaluation payload: {0}")]
    Malformed(String),
}
