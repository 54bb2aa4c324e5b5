//! Backtesting engine
//!
//! Replays a candle series through a strategy evaluator and produces a
//! result that is a pure function of (config, candles). The per-candle
//! order of operations is a contract:
//!
//! 1.  build the read-only prefix and context snapshot
//! 2.  evaluate the strategy (errors skip the candle's signals)
//! 3.  trailing stops
//! 4.  profit target
//! 5.  price-action entry-bar Supertrend exit
//! 6.  exit signals, then entry signals with admission checks
//! 7.  stop-loss post-check (signal exits win ties)
//! 8.  equity update
//! 9.  time-based exit
//! 10. capital protection
//! 11. drawdown circuit breaker
//! 12. equity point append

use chrono::Utc;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};
use tracing::{debug, info, warn};

use crate::config::{Config, StopLossMode, StrategyParams};
use crate::error::BacktestError;
use crate::execution::{MockExecutionProvider, OrderExecutionProvider, OrderRequest};
use crate::positions::TradeBook;
use crate::strategies::{create_strategy, EvalContext, StrategyEvaluator};
use crate::types::{
    Candle, CompletedTrade, Direction, EntrySignal, EquityPoint, ExitReason, ExitTrigger, Signal,
    TerminationReason, META_ATR,
};
use crate::validation;

/// Aggregate outcome of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_win: f64,
    pub max_win: f64,
    pub avg_loss: f64,
    pub max_loss: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub termination: TerminationReason,
    pub trades: Vec<CompletedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

/// Backtest engine. Owns the trade book, the equity curve and the cash
/// balance for the duration of a run; strategies and the execution provider
/// are injected as handles.
pub struct Backtester {
    config: Config,
    strategy: Box<dyn StrategyEvaluator>,
    executor: Box<dyn OrderExecutionProvider>,
}

impl Backtester {
    pub fn new(
        config: Config,
        strategy: Box<dyn StrategyEvaluator>,
        executor: Box<dyn OrderExecutionProvider>,
    ) -> Self {
        Backtester {
            config,
            strategy,
            executor,
        }
    }

    /// Wire the configured strategy with the mock execution provider.
    pub fn from_config(config: Config) -> Self {
        let strategy = create_strategy(&config);
        Self::new(config, strategy, Box::new(MockExecutionProvider::new()))
    }

    /// Run the backtest over an ascending candle series.
    pub fn run(&mut self, candles: &[Candle]) -> Result<BacktestResult, BacktestError> {
        // Admission: validation, then the severity-graded safety gate
        validation::admit(&self.config, Utc::now())?;

        if candles.is_empty() {
            return Err(BacktestError::NoData {
                symbol: self.config.trading.symbol.clone(),
                timeframe: self.config.trading.timeframe.clone(),
            });
        }

        // Input invariants fail fast before the loop
        for (index, candle) in candles.iter().enumerate() {
            candle
                .validate()
                .map_err(|source| BacktestError::CandleInvariantViolated { index, source })?;
            if index > 0 && candle.timestamp <= candles[index - 1].timestamp {
                return Err(BacktestError::CandleOutOfOrder { index });
            }
        }

        let warmup = self.strategy.warmup_candles().max(1);
        if candles.len() < warmup {
            return Err(BacktestError::InsufficientData {
                need: warmup,
                got: candles.len(),
            });
        }

        let trading = self.config.trading.clone();
        let initial_capital = trading.capital;
        let is_price_action = matches!(self.config.strategy, StrategyParams::PriceAction(_));

        let mut book = TradeBook::new(initial_capital);
        let mut equity_curve: Vec<EquityPoint> =
            Vec::with_capacity(candles.len() - warmup + 1);
        let mut peak = initial_capital;
        let mut termination = TerminationReason::Completed;

        info!(
            strategy = self.strategy.name(),
            symbol = %trading.symbol,
            candles = candles.len(),
            warmup,
            "Backtest started"
        );

        for i in (warmup - 1)..candles.len() {
            let candle = &candles[i];
            let close = candle.close;
            let prefix = &candles[..=i];

            // 1-2. Evaluate the strategy over the prefix
            let ctx = EvalContext {
                active_trades: book.active(),
                current_balance: book.cash_balance(),
                current_lots: book.current_lots(),
            };
            let signals = match self.strategy.evaluate(prefix, &ctx) {
                Ok(evaluation) => {
                    if !evaluation.diagnostics.is_empty() {
                        debug!(candle = i, diagnostics = ?evaluation.diagnostics, "Evaluated");
                    }
                    evaluation.signals
                }
                Err(err) => {
                    warn!(candle = i, %err, "Strategy evaluation failed, skipping candle");
                    Vec::new()
                }
            };

            // 3. Trailing stops
            if trading.trailing.enabled {
                for id in book.update_trailing_stops(close, &trading.trailing) {
                    book.close(id, close, candle.timestamp, ExitReason::TrailingStop);
                }
            }

            // 4. Profit target
            if let Some(target) = trading.profit_target_pct {
                let ids: Vec<u64> = book
                    .active()
                    .iter()
                    .filter(|t| t.unrealized_pnl_pct(close) >= target)
                    .map(|t| t.id)
                    .collect();
                for id in ids {
                    book.close(id, close, candle.timestamp, ExitReason::ProfitTarget);
                }
            }

            // 5. Price-action exit: close crossing the entry-bar Supertrend
            if is_price_action {
                let ids: Vec<u64> = book
                    .active()
                    .iter()
                    .filter(|t| match (t.entry_supertrend(), t.direction) {
                        (Some(level), Direction::Long) => close < level,
                        (Some(level), Direction::Short) => close > level,
                        (None, _) => false,
                    })
                    .map(|t| t.id)
                    .collect();
                for id in ids {
                    book.close(id, close, candle.timestamp, ExitReason::PriceAction);
                }
            }

            // 6. Signal processing: exits first, then entries
            for signal in &signals {
                if let Signal::Exit(exit) = signal {
                    let reason = match exit.trigger {
                        ExitTrigger::SupertrendFlip => ExitReason::SupertrendFlip,
                        ExitTrigger::Rule => ExitReason::Signal,
                    };
                    for id in book.exit_candidates(exit.direction, trading.exit_mode) {
                        let Some((direction, quantity, symbol)) = book
                            .active()
                            .iter()
                            .find(|t| t.id == id)
                            .map(|t| (t.direction, t.quantity, t.symbol.clone()))
                        else {
                            continue;
                        };

                        let request = OrderRequest::market(symbol, quantity, close);
                        let ack = match direction {
                            Direction::Long => self.executor.place_sell_order(&request),
                            Direction::Short => self.executor.place_buy_order(&request),
                        };

                        if ack.success {
                            book.close(id, close, candle.timestamp, reason);
                        } else {
                            warn!(
                                trade_id = id,
                                message = ack.message.as_deref().unwrap_or("unknown"),
                                "Exit order rejected, leaving trade open"
                            );
                        }
                    }
                }
            }

            for signal in &signals {
                if let Signal::Entry(entry) = signal {
                    self.try_enter(entry, &mut book, candle.timestamp);
                }
            }

            // 7. Stop-loss post-check, after signals so flips win ties
            match trading.stop_loss {
                StopLossMode::None => {}
                StopLossMode::Percent { pct } => {
                    let ids: Vec<u64> = book
                        .active()
                        .iter()
                        .filter(|t| t.unrealized_pnl_pct(close) <= -pct)
                        .map(|t| t.id)
                        .collect();
                    for id in ids {
                        book.close(id, close, candle.timestamp, ExitReason::StopLoss);
                    }
                }
                StopLossMode::Atr { multiplier } => {
                    let ids: Vec<u64> = book
                        .active()
                        .iter()
                        .filter(|t| {
                            t.atr_at_entry > 0.0
                                && match t.direction {
                                    Direction::Long => {
                                        close <= t.entry_price - multiplier * t.atr_at_entry
                                    }
                                    Direction::Short => {
                                        close >= t.entry_price + multiplier * t.atr_at_entry
                                    }
                                }
                        })
                        .map(|t| t.id)
                        .collect();
                    for id in ids {
                        book.close(id, close, candle.timestamp, ExitReason::StopLoss);
                    }
                }
            }

            // 8. Equity update
            let equity = book.cash_balance() + book.unrealized_pnl(close);
            if equity > peak {
                peak = equity;
            }
            let drawdown = if peak > 0.0 { (peak - equity) / peak } else { 0.0 };

            // 9. Time-based exit
            if let Some(square_off) = trading.mis_exit_time {
                if candle.timestamp.time() >= square_off && !book.is_empty() {
                    debug!(candle = i, "Square-off time reached");
                    book.close_all(close, candle.timestamp, ExitReason::TimeExit);
                }
            }

            // 10. Capital protection
            if equity - initial_capital <= -initial_capital * trading.max_loss_pct {
                warn!(
                    equity,
                    loss = initial_capital - equity,
                    "Capital protection tripped, terminating run"
                );
                book.close_all(close, candle.timestamp, ExitReason::CircuitBreaker);
                termination = TerminationReason::CapitalProtection;
                equity_curve.push(EquityPoint {
                    timestamp: candle.timestamp,
                    cash_balance: book.cash_balance(),
                    equity,
                    drawdown,
                });
                break;
            }

            // 11. Circuit breaker
            if drawdown > trading.max_drawdown_threshold {
                warn!(
                    drawdown,
                    threshold = trading.max_drawdown_threshold,
                    "Drawdown circuit breaker tripped, terminating run"
                );
                book.close_all(close, candle.timestamp, ExitReason::CircuitBreaker);
                termination = TerminationReason::CircuitBreaker;
                equity_curve.push(EquityPoint {
                    timestamp: candle.timestamp,
                    cash_balance: book.cash_balance(),
                    equity,
                    drawdown,
                });
                break;
            }

            // 12. Equity point
            equity_curve.push(EquityPoint {
                timestamp: candle.timestamp,
                cash_balance: book.cash_balance(),
                equity,
                drawdown,
            });
        }

        // End of data: flatten whatever is still open
        if termination == TerminationReason::Completed && !book.is_empty() {
            let last = &candles[candles.len() - 1];
            book.close_all(last.close, last.timestamp, ExitReason::EndOfData);
        }

        let result = build_result(initial_capital, termination, book, equity_curve);
        info!(
            final_capital = result.final_capital,
            trades = result.total_trades,
            termination = ?result.termination,
            "Backtest finished"
        );
        Ok(result)
    }

    /// Entry admission: position discipline, sizing, notional cap, routing.
    fn try_enter(
        &mut self,
        entry: &EntrySignal,
        book: &mut TradeBook,
        timestamp: chrono::DateTime<Utc>,
    ) {
        let trading = &self.config.trading;

        if !trading.pyramiding_enabled && !book.is_empty() {
            debug!("Entry rejected: position already open");
            return;
        }

        let quantity = if trading.dynamic_position_sizing {
            let budget = (trading.capital * trading.max_trade_pct).min(book.cash_balance());
            let computed = (budget / entry.price).floor();
            computed.max(trading.base_position_size)
        } else {
            trading.position_size
        };

        if quantity <= 0.0 {
            debug!("Entry rejected: computed quantity is zero");
            return;
        }

        if trading.pyramiding_enabled && book.current_lots() + quantity > trading.max_lots {
            debug!(
                lots = book.current_lots(),
                max_lots = trading.max_lots,
                "Entry rejected: lot cap reached"
            );
            return;
        }

        if entry.price * quantity > trading.capital * trading.max_trade_pct {
            debug!(
                notional = entry.price * quantity,
                cap = trading.capital * trading.max_trade_pct,
                "Entry rejected: notional exceeds per-trade cap"
            );
            return;
        }

        let request = OrderRequest::market(entry.symbol.clone(), quantity, entry.price);
        let ack = match entry.direction {
            Direction::Long => self.executor.place_buy_order(&request),
            Direction::Short => self.executor.place_sell_order(&request),
        };

        if !ack.success {
            warn!(
                message = ack.message.as_deref().unwrap_or("unknown"),
                "Entry order rejected"
            );
            return;
        }

        let atr_at_entry = entry.metadata.get(META_ATR).copied().unwrap_or(0.0);
        book.open(
            entry.symbol.clone(),
            entry.direction,
            entry.price,
            quantity,
            timestamp,
            atr_at_entry,
            entry.metadata.clone(),
        );
    }
}

/// Aggregate trades and the equity curve into the final result.
fn build_result(
    initial_capital: f64,
    termination: TerminationReason,
    book: TradeBook,
    equity_curve: Vec<EquityPoint>,
) -> BacktestResult {
    let final_capital = book.cash_balance();
    let trades = book.completed().to_vec();

    let winning: Vec<&CompletedTrade> = trades.iter().filter(|t| t.pnl > 0.0).collect();
    let losing: Vec<&CompletedTrade> = trades.iter().filter(|t| t.pnl <= 0.0).collect();

    let gross_profit: f64 = winning.iter().map(|t| t.pnl).sum();
    let gross_loss: f64 = losing.iter().map(|t| t.pnl.abs()).sum();

    let win_rate = if trades.is_empty() {
        0.0
    } else {
        winning.len() as f64 / trades.len() as f64 * 100.0
    };

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let avg_win = if winning.is_empty() {
        0.0
    } else {
        gross_profit / winning.len() as f64
    };
    let avg_loss = if losing.is_empty() {
        0.0
    } else {
        gross_loss / losing.len() as f64
    };
    let max_win = winning.iter().map(|t| t.pnl).fold(0.0, f64::max);
    let max_loss = losing.iter().map(|t| t.pnl.abs()).fold(0.0, f64::max);

    let max_drawdown = equity_curve
        .iter()
        .map(|p| p.drawdown)
        .fold(0.0, f64::max);

    // Per-candle equity returns, sample std-dev, annualized over 252 days
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0].equity != 0.0)
        .map(|w| (w[1].equity - w[0].equity) / w[0].equity)
        .collect();

    let sharpe_ratio = if returns.len() > 1 {
        let data = Data::new(returns);
        match (data.mean(), data.std_dev()) {
            (Some(mean), Some(std_dev)) if std_dev > 0.0 => {
                mean / std_dev * (252.0_f64).sqrt()
            }
            _ => 0.0,
        }
    } else {
        0.0
    };

    BacktestResult {
        initial_capital,
        final_capital,
        total_return: final_capital - initial_capital,
        total_return_pct: (final_capital - initial_capital) / initial_capital * 100.0,
        max_drawdown,
        win_rate,
        total_trades: trades.len(),
        winning_trades: winning.len(),
        losing_trades: losing.len(),
        avg_win,
        max_win,
        avg_loss,
        max_loss,
        profit_factor,
        sharpe_ratio,
        termination,
        trades,
        equity_curve,
    }
}
