//! Average True Range

use super::{IndicatorError, Result};

/// True range series. `TR_0 = high - low`; afterwards the max of
/// `high - low`, `|high - prev_close|`, `|low - prev_close|`.
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Result<Vec<f64>> {
    if highs.len() != lows.len() || highs.len() != closes.len() {
        return Err(IndicatorError::MismatchedInputs);
    }

    let mut tr = Vec::with_capacity(highs.len());
    for i in 0..highs.len() {
        let value = if i == 0 {
            highs[0] - lows[0]
        } else {
            let hl = highs[i] - lows[i];
            let hc = (highs[i] - closes[i - 1]).abs();
            let lc = (lows[i] - closes[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(value);
    }

    Ok(tr)
}

/// Calculate ATR with Wilder smoothing.
///
/// The first value, at index `period - 1`, is the simple mean of the first
/// `period` true ranges; afterwards
/// `atr_i = (atr_{i-1} * (period - 1) + tr_i) / period`.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }

    let tr = true_range(highs, lows, closes)?;
    if tr.len() < period {
        return Err(IndicatorError::InsufficientData {
            need: period,
            got: tr.len(),
        });
    }

    let mut result = vec![None; tr.len()];
    let seed: f64 = tr[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = Some(seed);

    let mut prev = seed;
    for i in period..tr.len() {
        prev = (prev * (period - 1) as f64 + tr[i]) / period as f64;
        result[i] = Some(prev);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_true_range_uses_previous_close() {
        let highs = vec![10.0, 12.0];
        let lows = vec![9.0, 11.0];
        let closes = vec![9.5, 11.5];

        let tr = true_range(&highs, &lows, &closes).unwrap();
        assert_relative_eq!(tr[0], 1.0);
        // max(12-11, |12-9.5|, |11-9.5|) = 2.5
        assert_relative_eq!(tr[1], 2.5);
    }

    #[test]
    fn test_atr_wilder_smoothing() {
        // Constant 1-point ranges with no gaps: every TR is 1, so ATR is 1.
        let highs = vec![10.5; 8];
        let lows = vec![9.5; 8];
        let closes = vec![10.0; 8];

        let result = atr(&highs, &lows, &closes, 3).unwrap();
        assert!(result[1].is_none());
        for value in result.iter().skip(2) {
            assert_relative_eq!(value.unwrap(), 1.0);
        }
    }

    #[test]
    fn test_atr_seed_is_simple_mean() {
        let highs = vec![11.0, 12.0, 13.0, 14.0];
        let lows = vec![9.0, 9.0, 9.0, 9.0];
        let closes = vec![10.0, 10.0, 10.0, 10.0];

        // TRs: 2, 3, 4, 5; seed at index 2 = 3; next = (3*2 + 5)/3
        let result = atr(&highs, &lows, &closes, 3).unwrap();
        assert_relative_eq!(result[2].unwrap(), 3.0);
        assert_relative_eq!(result[3].unwrap(), 11.0 / 3.0);
    }

    #[test]
    fn test_atr_insufficient_data() {
        let highs = vec![10.0, 11.0];
        let lows = vec![9.0, 10.0];
        let closes = vec![9.5, 10.5];
        assert!(atr(&highs, &lows, &closes, 14).is_err());
    }

    #[test]
    fn test_atr_mismatched_lengths() {
        assert_eq!(
            atr(&[1.0, 2.0], &[1.0], &[1.0, 2.0], 1),
            Err(IndicatorError::MismatchedInputs)
        );
    }
}
