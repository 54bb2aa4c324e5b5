//! Trend-following strategy implementation
//!
//! Long when the close is above both the DEMA and the Supertrend line,
//! short when below both. A Supertrend flip against the book closes every
//! open trade.

use statrs::statistics::{Data, Distribution};

use crate::error::StrategyError;
use crate::indicators::{atr, dema, supertrend};
use crate::strategies::{EvalContext, Evaluation, StrategyEvaluator, WARMUP_BUFFER};
use crate::types::{
    clamp_score, Candle, Direction, EntrySignal, ExitDirection, ExitSignal, ExitTrigger, Signal,
    Symbol, META_ATR,
};

use super::config::TrendFollowingConfig;

pub struct TrendFollowingStrategy {
    config: TrendFollowingConfig,
    symbol: Symbol,
}

impl TrendFollowingStrategy {
    pub fn new(config: TrendFollowingConfig, symbol: Symbol) -> Self {
        Self { config, symbol }
    }

    /// Std-dev of close-to-close returns over the volatility window.
    fn return_volatility(&self, closes: &[f64]) -> Option<f64> {
        let window = self.config.volatility_window;
        if closes.len() < window + 1 {
            return None;
        }
        let tail = &closes[closes.len() - window - 1..];
        let returns: Vec<f64> = tail.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
        Data::new(returns).std_dev()
    }

    fn entry_allowed(&self, closes: &[f64], close: f64, dema_value: f64) -> bool {
        if let Some(min_strength) = self.config.min_trend_strength {
            let strength = (close - dema_value).abs() / close;
            if strength < min_strength {
                return false;
            }
        }

        if let Some(cap) = self.config.volatility_cap {
            match self.return_volatility(closes) {
                Some(vol) if vol > cap => return false,
                _ => {}
            }
        }

        true
    }
}

impl StrategyEvaluator for TrendFollowingStrategy {
    fn name(&self) -> &'static str {
        "trend_following"
    }

    fn warmup_candles(&self) -> usize {
        self.config.max_period() + WARMUP_BUFFER
    }

    fn evaluate(
        &mut self,
        candles: &[Candle],
        ctx: &EvalContext<'_>,
    ) -> Result<Evaluation, StrategyError> {
        let mut evaluation = Evaluation::default();

        // One extra candle so the flip detector has a defined predecessor
        if candles.len() < self.config.max_period() + 1 {
            return Ok(evaluation);
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

        let dema_values = dema(&closes, self.config.dema_period);
        let st = supertrend(
            &highs,
            &lows,
            &closes,
            self.config.supertrend_period,
            self.config.supertrend_multiplier,
        )?;
        let atr_values = atr(&highs, &lows, &closes, self.config.supertrend_period)?;

        let i = candles.len() - 1;
        let last = &candles[i];
        let close = last.close;
        let dema_value = dema_values[i];

        let (Some(st_value), Some(current_atr)) = (st.value[i], atr_values[i]) else {
            return Ok(evaluation);
        };

        evaluation.diagnostics.insert("close".into(), close);
        evaluation.diagnostics.insert("dema".into(), dema_value);
        evaluation.diagnostics.insert("supertrend".into(), st_value);
        evaluation.diagnostics.insert("atr".into(), current_atr);

        // Supertrend flip closes the whole book
        if ctx.has_open_trades() && st.flipped_at(i) {
            evaluation.signals.push(Signal::Exit(ExitSignal {
                symbol: self.symbol.clone(),
                timeframe: last.timeframe,
                direction: ExitDirection::Both,
                price: close,
                strength: 100.0,
                confidence: 80.0,
                trigger: ExitTrigger::SupertrendFlip,
            }));
            return Ok(evaluation);
        }

        if ctx.has_open_trades() {
            return Ok(evaluation);
        }

        let direction = if close > dema_value && close > st_value {
            Some(Direction::Long)
        } else if close < dema_value && close < st_value {
            Some(Direction::Short)
        } else {
            None
        };

        if let Some(direction) = direction {
            if self.entry_allowed(&closes, close, dema_value) {
                let trend_strength = (close - dema_value).abs() / close;
                let mut signal = EntrySignal {
                    symbol: self.symbol.clone(),
                    timeframe: last.timeframe,
                    direction,
                    price: close,
                    strength: clamp_score(trend_strength * 10_000.0),
                    confidence: 65.0,
                    metadata: Default::default(),
                };
                signal.metadata.insert(META_ATR.into(), current_atr);
                signal.metadata.insert("supertrend".into(), st_value);
                evaluation.signals.push(Signal::Entry(signal));
            }
        }

        Ok(evaluation)
    }
}
