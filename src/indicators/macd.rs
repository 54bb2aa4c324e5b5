//! Moving Average Convergence Divergence

use super::ema::ema;
use super::{IndicatorError, Result};

/// MACD line, signal line and histogram, all defined from index 0.
#[derive(Debug, Clone)]
pub struct MacdResult {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Calculate MACD.
///
/// `macd = EMA(fast) - EMA(slow)`; `signal = EMA(signal_period)` of the MACD
/// line; `histogram = macd - signal`. All EMAs use first-value seeding.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> Result<MacdResult> {
    if fast == 0 || slow == 0 || signal_period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    if values.is_empty() {
        return Err(IndicatorError::InsufficientData { need: 1, got: 0 });
    }

    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);

    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = ema(&macd_line, signal_period);
    let histogram: Vec<f64> = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| m - s)
        .collect();

    Ok(MacdResult {
        macd: macd_line,
        signal: signal_line,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_macd_zero_on_constant_series() {
        let values = vec![50.0; 40];
        let result = macd(&values, 12, 26, 9).unwrap();
        for i in 0..values.len() {
            assert_relative_eq!(result.macd[i], 0.0);
            assert_relative_eq!(result.signal[i], 0.0);
            assert_relative_eq!(result.histogram[i], 0.0);
        }
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let values: Vec<f64> = (0..60).map(|x| 100.0 + x as f64).collect();
        let result = macd(&values, 12, 26, 9).unwrap();
        assert!(*result.macd.last().unwrap() > 0.0);
    }

    #[test]
    fn test_macd_histogram_identity() {
        let values: Vec<f64> = (0..40).map(|x| 100.0 + (x as f64).sin() * 3.0).collect();
        let result = macd(&values, 5, 13, 4).unwrap();
        for i in 0..values.len() {
            assert_relative_eq!(result.histogram[i], result.macd[i] - result.signal[i]);
        }
    }

    #[test]
    fn test_macd_rejects_zero_period() {
        assert!(macd(&[1.0, 2.0], 0, 26, 9).is_err());
    }
}
