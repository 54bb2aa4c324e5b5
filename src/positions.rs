//! Trade book: active trades and the completed-trade ledger
//!
//! Single-writer within a run; only the orchestrator mutates it. Enforces
//! lots accounting, FIFO/LIFO exit ordering and monotone trailing stops.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::{ExitMode, TrailingMode, TrailingStopConfig};
use crate::types::{
    ActiveTrade, CompletedTrade, Direction, ExitDirection, ExitReason, Symbol,
};

pub struct TradeBook {
    active: Vec<ActiveTrade>,
    completed: Vec<CompletedTrade>,
    cash_balance: f64,
    next_id: u64,
}

impl TradeBook {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            active: Vec::new(),
            completed: Vec::new(),
            cash_balance: initial_capital,
            next_id: 1,
        }
    }

    pub fn active(&self) -> &[ActiveTrade] {
        &self.active
    }

    pub fn completed(&self) -> &[CompletedTrade] {
        &self.completed
    }

    pub fn cash_balance(&self) -> f64 {
        self.cash_balance
    }

    /// Total open quantity across active trades
    pub fn current_lots(&self) -> f64 {
        self.active.iter().map(|t| t.quantity).sum()
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.active.iter().map(|t| t.unrealized_pnl(price)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Open a trade; extremes start at the entry price.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        symbol: Symbol,
        direction: Direction,
        entry_price: f64,
        quantity: f64,
        entry_time: DateTime<Utc>,
        atr_at_entry: f64,
        metadata: HashMap<String, f64>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        debug!(
            trade_id = id,
            %symbol,
            ?direction,
            entry_price,
            quantity,
            "Trade opened"
        );

        self.active.push(ActiveTrade {
            id,
            symbol,
            direction,
            entry_price,
            quantity,
            entry_time,
            atr_at_entry,
            highest_seen: entry_price,
            lowest_seen: entry_price,
            trailing_stop_price: None,
            trailing_active: false,
            metadata,
        });
        id
    }

    /// Trade ids matching `direction`, ordered for exit resolution:
    /// FIFO = ascending entry time, LIFO = descending. Engine-forced
    /// closures (`close_all`) always resolve FIFO.
    pub fn exit_candidates(&self, direction: ExitDirection, mode: ExitMode) -> Vec<u64> {
        let mut candidates: Vec<&ActiveTrade> = self
            .active
            .iter()
            .filter(|t| direction.matches(t.direction))
            .collect();

        match mode {
            ExitMode::Fifo => candidates.sort_by_key(|t| (t.entry_time, t.id)),
            ExitMode::Lifo => {
                candidates.sort_by_key(|t| (std::cmp::Reverse(t.entry_time), std::cmp::Reverse(t.id)))
            }
        }

        candidates.into_iter().map(|t| t.id).collect()
    }

    /// Close one trade at `price`, realize its P&L into the cash balance and
    /// append the completed record. Returns None for unknown ids.
    pub fn close(
        &mut self,
        id: u64,
        price: f64,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<&CompletedTrade> {
        let index = self.active.iter().position(|t| t.id == id)?;
        let trade = self.active.remove(index);

        let pnl = trade.unrealized_pnl(price);
        let notional = trade.entry_price * trade.quantity;
        let pnl_pct = if notional == 0.0 {
            0.0
        } else {
            pnl / notional * 100.0
        };

        self.cash_balance += pnl;

        debug!(
            trade_id = trade.id,
            symbol = %trade.symbol,
            exit_price = price,
            pnl,
            ?reason,
            "Trade closed"
        );

        self.completed.push(CompletedTrade {
            entry_time: trade.entry_time,
            exit_time: time,
            symbol: trade.symbol,
            direction: trade.direction,
            entry_price: trade.entry_price,
            exit_price: price,
            quantity: trade.quantity,
            pnl,
            pnl_pct,
            duration_ms: (time - trade.entry_time).num_milliseconds(),
            exit_reason: reason,
        });

        self.completed.last()
    }

    /// Close every open trade in FIFO order.
    pub fn close_all(&mut self, price: f64, time: DateTime<Utc>, reason: ExitReason) {
        for id in self.exit_candidates(ExitDirection::Both, ExitMode::Fifo) {
            self.close(id, price, time, reason);
        }
    }

    /// Per-candle trailing-stop bookkeeping. Updates extremes, activates
    /// stops once the activation profit is reached, tightens them in the
    /// favorable direction only, and returns the ids whose stop the close
    /// has crossed.
    pub fn update_trailing_stops(&mut self, close: f64, config: &TrailingStopConfig) -> Vec<u64> {
        let mut crossed = Vec::new();

        for trade in &mut self.active {
            trade.highest_seen = trade.highest_seen.max(close);
            trade.lowest_seen = trade.lowest_seen.min(close);

            let pnl_pct = trade.unrealized_pnl_pct(close);
            if !trade.trailing_active && pnl_pct >= config.activation_profit_pct {
                trade.trailing_active = true;
            }

            if trade.trailing_active {
                let candidate = match (trade.direction, config.mode) {
                    (Direction::Long, TrailingMode::Atr { multiplier }) => {
                        trade.highest_seen - trade.atr_at_entry * multiplier
                    }
                    (Direction::Short, TrailingMode::Atr { multiplier }) => {
                        trade.lowest_seen + trade.atr_at_entry * multiplier
                    }
                    (Direction::Long, TrailingMode::Percent { pct }) => {
                        trade.highest_seen * (1.0 - pct / 100.0)
                    }
                    (Direction::Short, TrailingMode::Percent { pct }) => {
                        trade.lowest_seen * (1.0 + pct / 100.0)
                    }
                };

                // Tighten only: never loosen an existing stop
                trade.trailing_stop_price = Some(match (trade.direction, trade.trailing_stop_price)
                {
                    (Direction::Long, Some(existing)) => existing.max(candidate),
                    (Direction::Short, Some(existing)) => existing.min(candidate),
                    (_, None) => candidate,
                });
            }

            if let Some(stop) = trade.trailing_stop_price {
                let hit = match trade.direction {
                    Direction::Long => close <= stop,
                    Direction::Short => close >= stop,
                };
                if hit {
                    crossed.push(trade.id);
                }
            }
        }

        crossed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn book_with_entries(prices: &[f64], direction: Direction) -> TradeBook {
        let mut book = TradeBook::new(100_000.0);
        for (i, &price) in prices.iter().enumerate() {
            book.open(
                Symbol::new("SBIN"),
                direction,
                price,
                1.0,
                ts(i as i64 * 60),
                1.0,
                HashMap::new(),
            );
        }
        book
    }

    #[test]
    fn test_lots_accounting() {
        let book = book_with_entries(&[100.0, 110.0, 120.0], Direction::Long);
        assert_eq!(book.current_lots(), 3.0);
        assert_eq!(book.active().len(), 3);
    }

    #[test]
    fn test_fifo_orders_ascending_entry_time() {
        let book = book_with_entries(&[100.0, 110.0, 120.0], Direction::Long);
        let ids = book.exit_candidates(ExitDirection::Long, ExitMode::Fifo);
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_lifo_orders_descending_entry_time() {
        let book = book_with_entries(&[100.0, 110.0, 120.0], Direction::Long);
        let ids = book.exit_candidates(ExitDirection::Long, ExitMode::Lifo);
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_both_matches_every_direction() {
        let mut book = book_with_entries(&[100.0, 110.0], Direction::Long);
        book.open(
            Symbol::new("SBIN"),
            Direction::Short,
            105.0,
            1.0,
            ts(600),
            1.0,
            HashMap::new(),
        );

        let ids = book.exit_candidates(ExitDirection::Both, ExitMode::Lifo);
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_exit_candidates_filter_by_direction() {
        let mut book = book_with_entries(&[100.0], Direction::Long);
        book.open(
            Symbol::new("SBIN"),
            Direction::Short,
            105.0,
            1.0,
            ts(600),
            1.0,
            HashMap::new(),
        );

        assert_eq!(
            book.exit_candidates(ExitDirection::Long, ExitMode::Fifo),
            vec![1]
        );
        assert_eq!(
            book.exit_candidates(ExitDirection::Short, ExitMode::Fifo),
            vec![2]
        );
    }

    #[test]
    fn test_close_realizes_pnl_into_cash() {
        let mut book = book_with_entries(&[100.0], Direction::Long);
        let completed = book.close(1, 115.0, ts(900), ExitReason::Signal).unwrap();

        assert_eq!(completed.pnl, 15.0);
        assert_eq!(completed.exit_reason, ExitReason::Signal);
        assert_eq!(book.cash_balance(), 100_015.0);
        assert!(book.is_empty());
    }

    #[test]
    fn test_short_pnl_sign() {
        let mut book = book_with_entries(&[100.0], Direction::Short);
        let completed = book.close(1, 90.0, ts(900), ExitReason::Signal).unwrap();
        assert_eq!(completed.pnl, 10.0);
        assert!((completed.pnl_pct - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_trailing_stop_activation_and_tightening() {
        let mut book = book_with_entries(&[100.0], Direction::Long);
        let config = TrailingStopConfig {
            enabled: true,
            activation_profit_pct: 1.0,
            mode: TrailingMode::Atr { multiplier: 2.0 },
        };

        // 2% profit activates: stop = 102 - 2*1 = 100
        let crossed = book.update_trailing_stops(102.0, &config);
        assert!(crossed.is_empty());
        assert_eq!(book.active()[0].trailing_stop_price, Some(100.0));
        assert!(book.active()[0].trailing_active);

        // New high tightens the stop to 103
        let crossed = book.update_trailing_stops(105.0, &config);
        assert!(crossed.is_empty());
        assert_eq!(book.active()[0].trailing_stop_price, Some(103.0));

        // Pullback below the stop reports the trade as crossed
        let crossed = book.update_trailing_stops(102.0, &config);
        assert_eq!(crossed, vec![1]);
        // The stop never loosened
        assert_eq!(book.active()[0].trailing_stop_price, Some(103.0));
    }

    #[test]
    fn test_trailing_stop_monotone_for_short() {
        let mut book = book_with_entries(&[100.0], Direction::Short);
        let config = TrailingStopConfig {
            enabled: true,
            activation_profit_pct: 1.0,
            mode: TrailingMode::Atr { multiplier: 2.0 },
        };

        book.update_trailing_stops(97.0, &config);
        assert_eq!(book.active()[0].trailing_stop_price, Some(99.0));

        book.update_trailing_stops(94.0, &config);
        assert_eq!(book.active()[0].trailing_stop_price, Some(96.0));

        // Bounce that stays under the stop does not loosen it
        let crossed = book.update_trailing_stops(95.0, &config);
        assert!(crossed.is_empty());
        assert_eq!(book.active()[0].trailing_stop_price, Some(96.0));
    }

    #[test]
    fn test_close_all_fifo_order() {
        let mut book = book_with_entries(&[100.0, 110.0, 120.0], Direction::Long);
        book.close_all(115.0, ts(1800), ExitReason::EndOfData);

        let pnls: Vec<f64> = book.completed().iter().map(|t| t.pnl).collect();
        assert_eq!(pnls, vec![15.0, 5.0, -5.0]);
        assert_eq!(book.cash_balance(), 100_015.0);
    }
}
