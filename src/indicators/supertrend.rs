//! Supertrend indicator

use super::atr::atr;
use super::{IndicatorError, Result};

/// Supertrend line and trend direction per candle.
#[derive(Debug, Clone)]
pub struct SupertrendResult {
    pub value: Vec<Option<f64>>,
    /// true = uptrend (line below price), false = downtrend
    pub is_uptrend: Vec<Option<bool>>,
}

impl SupertrendResult {
    /// Detect a direction change between candles `i - 1` and `i`.
    pub fn flipped_at(&self, i: usize) -> bool {
        if i == 0 {
            return false;
        }
        matches!(
            (self.is_uptrend[i - 1], self.is_uptrend[i]),
            (Some(prev), Some(cur)) if prev != cur
        )
    }
}

/// Calculate Supertrend over ATR(`period`) with the given multiplier.
///
/// Basic bands are `hl2 ± multiplier * atr`. Final bands only tighten while
/// the previous close stays inside them; the trend flips when the close
/// crosses the active final band. The first defined bar starts in an
/// uptrend.
pub fn supertrend(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
    multiplier: f64,
) -> Result<SupertrendResult> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    let len = highs.len();
    if lows.len() != len || closes.len() != len {
        return Err(IndicatorError::MismatchedInputs);
    }
    if len < period {
        return Err(IndicatorError::InsufficientData {
            need: period,
            got: len,
        });
    }

    let atr_values = atr(highs, lows, closes, period)?;

    let mut value = vec![None; len];
    let mut is_uptrend = vec![None; len];

    let start = period - 1;
    let mut prev_final_upper = 0.0;
    let mut prev_final_lower = 0.0;
    let mut prev_trend = true;

    for i in start..len {
        let Some(atr_val) = atr_values[i] else {
            continue;
        };

        let hl2 = (highs[i] + lows[i]) / 2.0;
        let basic_upper = hl2 + multiplier * atr_val;
        let basic_lower = hl2 - multiplier * atr_val;

        let prev_close = if i > 0 { closes[i - 1] } else { closes[i] };

        let final_upper =
            if i == start || basic_upper < prev_final_upper || prev_close > prev_final_upper {
                basic_upper
            } else {
                prev_final_upper
            };

        let final_lower =
            if i == start || basic_lower > prev_final_lower || prev_close < prev_final_lower {
                basic_lower
            } else {
                prev_final_lower
            };

        let trend = if i == start {
            true
        } else if prev_trend && closes[i] <= final_lower {
            false
        } else if !prev_trend && closes[i] >= final_upper {
            true
        } else {
            prev_trend
        };

        value[i] = Some(if trend { final_lower } else { final_upper });
        is_uptrend[i] = Some(trend);

        prev_final_upper = final_upper;
        prev_final_lower = final_lower;
        prev_trend = trend;
    }

    Ok(SupertrendResult { value, is_uptrend })
}
