//! Average Directional Index

use super::atr::true_range;
use super::{IndicatorError, Result};

/// Calculate ADX with standard Wilder smoothing.
///
/// Directional movements are smoothed with Wilder averages seeded by a
/// simple mean over the first `period` values; DX is defined from index
/// `period`, and ADX from index `2 * period - 1` (mean of the first
/// `period` DX values, then Wilder-smoothed).
pub fn adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(IndicatorError::ZeroPeriod);
    }
    let len = highs.len();
    if lows.len() != len || closes.len() != len {
        return Err(IndicatorError::MismatchedInputs);
    }
    if len < 2 * period {
        return Err(IndicatorError::InsufficientData {
            need: 2 * period,
            got: len,
        });
    }

    let tr = true_range(highs, lows, closes)?;

    // +DM / -DM, defined from index 1
    let mut plus_dm = vec![0.0; len];
    let mut minus_dm = vec![0.0; len];
    for i in 1..len {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];
        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
    }

    // Wilder-smoothed TR / +DM / -DM, seeded over indices 1..=period
    let mut sm_tr: f64 = tr[1..=period].iter().sum::<f64>() / period as f64;
    let mut sm_plus: f64 = plus_dm[1..=period].iter().sum::<f64>() / period as f64;
    let mut sm_minus: f64 = minus_dm[1..=period].iter().sum::<f64>() / period as f64;

    let mut dx = vec![None; len];
    dx[period] = Some(dx_value(sm_plus, sm_minus, sm_tr));

    for i in period + 1..len {
        sm_tr = (sm_tr * (period - 1) as f64 + tr[i]) / period as f64;
        sm_plus = (sm_plus * (period - 1) as f64 + plus_dm[i]) / period as f64;
        sm_minus = (sm_minus * (period - 1) as f64 + minus_dm[i]) / period as f64;
        dx[i] = Some(dx_value(sm_plus, sm_minus, sm_tr));
    }

    // ADX: mean of the first `period` DX values, then Wilder smoothing
    let mut result = vec![None; len];
    let first_adx_idx = 2 * period - 1;
    if first_adx_idx >= len {
        return Ok(result);
    }

    let seed: f64 = dx[period..=first_adx_idx]
        .iter()
        .map(|v| v.unwrap_or(0.0))
        .sum::<f64>()
        / period as f64;
    result[first_adx_idx] = Some(seed);

    let mut prev = seed;
    for i in first_adx_idx + 1..len {
        if let Some(dx_val) = dx[i] {
            prev = (prev * (period - 1) as f64 + dx_val) / period as f64;
            result[i] = Some(prev);
        }
    }

    Ok(result)
}

fn dx_value(sm_plus: f64, sm_minus: f64, sm_tr: f64) -> f64 {
    if sm_tr == 0.0 {
        return 0.0;
    }
    let plus_di = 100.0 * sm_plus / sm_tr;
    let minus_di = 100.0 * sm_minus / sm_tr;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return 0.0;
    }
    100.0 * (plus_di - minus_di).abs() / di_sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adx_defined_from_two_periods() {
        let closes: Vec<f64> = (0..40).map(|x| 100.0 + x as f64).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();

        let result = adx(&highs, &lows, &closes, 14).unwrap();
        assert!(result[26].is_none());
        assert!(result[27].is_some());
    }

    #[test]
    fn test_adx_high_in_strong_trend() {
        let closes: Vec<f64> = (0..60).map(|x| 100.0 + x as f64 * 2.0).collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 0.5).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 0.5).collect();

        let result = adx(&highs, &lows, &closes, 14).unwrap();
        assert!(result.last().unwrap().unwrap() > 50.0);
    }

    #[test]
    fn test_adx_bounded() {
        let closes: Vec<f64> = (0..60)
            .map(|x| 100.0 + ((x as f64) * 0.7).sin() * 5.0)
            .collect();
        let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();

        let result = adx(&highs, &lows, &closes, 14).unwrap();
        for value in result.iter().flatten() {
            assert!((0.0..=100.0).contains(value));
        }
    }

    #[test]
    fn test_adx_insufficient_data() {
        let data = vec![100.0; 20];
        assert!(adx(&data, &data, &data, 14).is_err());
    }
}
