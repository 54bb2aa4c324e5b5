//! Technical indicators
//!
//! Numerically exact implementations used by the strategy evaluators. The
//! conventions here are load-bearing for reproducibility:
//!
//! - all arithmetic is IEEE-754 double precision, accumulated left-to-right
//! - EMAs are seeded with the first raw value, not a prefix SMA
//! - ATR and RSI use Wilder smoothing seeded with a simple mean
//!
//! Values that are undefined until a period has elapsed are `None`;
//! recursively seeded series (EMA, DEMA, MACD) are defined from index 0.

use thiserror::Error;

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod dema;
pub mod ema;
pub mod macd;
pub mod registry;
pub mod rsi;
pub mod sma;
pub mod supertrend;
pub mod support_resistance;

pub use adx::adx;
pub use atr::{atr, true_range};
pub use bollinger::{bollinger_bands, BollingerResult};
pub use dema::dema;
pub use ema::ema;
pub use macd::{macd, MacdResult};
pub use registry::{IndicatorKind, IndicatorOutput, IndicatorParams, IndicatorRegistry};
pub use rsi::rsi;
pub use sma::sma;
pub use supertrend::{supertrend, SupertrendResult};
pub use support_resistance::{support_resistance, SupportResistanceResult};

/// Errors from indicator calculations
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("period must be greater than 0")]
    ZeroPeriod,

    #[error("insufficient data: need {need}, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("input series lengths must match")]
    MismatchedInputs,

    #[error("missing required parameter: {0}")]
    MissingParam(&'static str),

    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),
}

pub type Result<T> = std::result::Result<T, IndicatorError>;

/// Round a value to two decimals for external reporting. Internal
/// computations always keep full precision.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
