//! Rolling support / resistance levels

use super::{IndicatorError, Result};

#[derive(Debug, Clone)]
pub struct SupportResistanceResult {
    /// Lowest low over the trailing window
    pub support: Vec<Option<f64>>,
    /// Highest high over the trailing window
    pub resistance: Vec<Option<f64>>,
}

/// Rolling extremes over the last `lookback` candles, window inclusive of
/// the current candle.
pub fn support_resistance(
    highs: &[f64],
    lows: &[f64],
    lookback: usize,
) -> Result<SupportResistanceResult> {
    if lookback == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    if highs.len() != lows.len() {
        return Err(IndicatorError::MismatchedInputs);
    }
    if highs.len() < lookback {
        return Err(IndicatorError::InsufficientData {
            need: lookback,
            got: highs.len(),
        });
    }

    let mut support = Vec::with_capacity(lows.len());
    let mut resistance = Vec::with_capacity(highs.len());

    for i in 0..highs.len() {
        if i + 1 < lookback {
            support.push(None);
            resistance.push(None);
        } else {
            let window_lows = &lows[i + 1 - lookback..=i];
            let window_highs = &highs[i + 1 - lookback..=i];
            support.push(Some(window_lows.iter().copied().fold(f64::MAX, f64::min)));
            resistance.push(Some(window_highs.iter().copied().fold(f64::MIN, f64::max)));
        }
    }

    Ok(SupportResistanceResult {
        support,
        resistance,
    })
}
