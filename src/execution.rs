//! Order execution interface and the mock fill provider
//!
//! The engine routes signal-driven orders through an
//! `OrderExecutionProvider`; an acknowledgement with `success = true` is the
//! source of truth for a fill. Protective exits (stops, targets, square-off,
//! terminations) settle directly at the candle close and do not pass
//! through the provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::types::{Direction, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
}

/// Broker product: intraday (auto square-off) or delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductType {
    Mis,
    Cnc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Validity {
    Day,
    Ioc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub quantity: f64,
    pub price: f64,
    pub order_type: OrderType,
    pub product: ProductType,
    pub validity: Validity,
}

impl OrderRequest {
    /// Market order with the engine's defaults.
    pub fn market(symbol: Symbol, quantity: f64, price: f64) -> Self {
        Self {
            symbol,
            quantity,
            price,
            order_type: OrderType::Market,
            product: ProductType::Mis,
            validity: Validity::Day,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub success: bool,
    pub order_id: Option<String>,
    pub message: Option<String>,
}

impl OrderAck {
    pub fn accepted(order_id: String) -> Self {
        Self {
            success: true,
            order_id: Some(order_id),
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            order_id: None,
            message: Some(message.into()),
        }
    }
}

/// Net broker position as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: Symbol,
    pub direction: Direction,
    pub quantity: f64,
    pub average_price: f64,
}

/// Order routing interface
pub trait OrderExecutionProvider: Send {
    fn place_buy_order(&mut self, order: &OrderRequest) -> OrderAck;
    fn place_sell_order(&mut self, order: &OrderRequest) -> OrderAck;
    fn get_positions(&self) -> Vec<BrokerPosition>;
}

/// Mock provider: acknowledges every order at the requested price and
/// tracks net positions per symbol.
#[derive(Debug, Default)]
pub struct MockExecutionProvider {
    next_order_id: u64,
    /// Net signed quantity and cost basis per symbol (+ long, - short)
    net_positions: HashMap<Symbol, (f64, f64)>,
}

impl MockExecutionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> String {
        self.next_order_id += 1;
        format!("MOCK-{}", self.next_order_id)
    }

    fn apply(&mut self, symbol: &Symbol, signed_quantity: f64, price: f64) {
        let (quantity, avg_price) = self
            .net_positions
            .get(symbol)
            .copied()
            .unwrap_or((0.0, 0.0));
        let new_quantity = quantity + signed_quantity;

        // Average price only re-weights while adding in the same direction
        let new_avg = if quantity == 0.0 || quantity.signum() != new_quantity.signum() {
            price
        } else if signed_quantity.signum() == quantity.signum() {
            (avg_price * quantity.abs() + price * signed_quantity.abs())
                / (quantity.abs() + signed_quantity.abs())
        } else {
            avg_price
        };

        if new_quantity == 0.0 {
            self.net_positions.remove(symbol);
        } else {
            self.net_positions
                .insert(symbol.clone(), (new_quantity, new_avg));
        }
    }
}

impl OrderExecutionProvider for MockExecutionProvider {
    fn place_buy_order(&mut self, order: &OrderRequest) -> OrderAck {
        if order.quantity <= 0.0 {
            return OrderAck::rejected("quantity must be positive");
        }
        let order_id = self.next_id();
        self.apply(&order.symbol, order.quantity, order.price);
        debug!(%order_id, symbol = %order.symbol, quantity = order.quantity, price = order.price, "BUY acknowledged");
        OrderAck::accepted(order_id)
    }

    fn place_sell_order(&mut self, order: &OrderRequest) -> OrderAck {
        if order.quantity <= 0.0 {
            return OrderAck::rejected("quantity must be positive");
        }
        let order_id = self.next_id();
        self.apply(&order.symbol, -order.quantity, order.price);
        debug!(%order_id, symbol = %order.symbol, quantity = order.quantity, price = order.price, "SELL acknowledged");
        OrderAck::accepted(order_id)
    }

    fn get_positions(&self) -> Vec<BrokerPosition> {
        let mut positions: Vec<BrokerPosition> = self
            .net_positions
            .iter()
            .map(|(symbol, &(quantity, average_price))| BrokerPosition {
                symbol: symbol.clone(),
                direction: if quantity >= 0.0 {
                    Direction::Long
                } else {
                    Direction::Short
                },
                quantity: quantity.abs(),
                average_price,
            })
            .collect();
        positions.sort_by(|a, b| a.symbol.as_str().cmp(b.symbol.as_str()));
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_acknowledges_orders() {
        let mut provider = MockExecutionProvider::new();
        let order = OrderRequest::market(Symbol::new("SBIN"), 10.0, 550.0);

        let ack = provider.place_buy_order(&order);
        assert!(ack.success);
        assert_eq!(ack.order_id.as_deref(), Some("MOCK-1"));

        let ack = provider.place_sell_order(&order);
        assert!(ack.success);
        assert_eq!(ack.order_id.as_deref(), Some("MOCK-2"));
    }

    #[test]
    fn test_mock_rejects_non_positive_quantity() {
        let mut provider = MockExecutionProvider::new();
        let order = OrderRequest::market(Symbol::new("SBIN"), 0.0, 550.0);
        let ack = provider.place_buy_order(&order);
        assert!(!ack.success);
        assert!(ack.message.is_some());
    }

    #[test]
    fn test_mock_tracks_net_positions() {
        let mut provider = MockExecutionProvider::new();
        let symbol = Symbol::new("SBIN");

        provider.place_buy_order(&OrderRequest::market(symbol.clone(), 10.0, 100.0));
        provider.place_buy_order(&OrderRequest::market(symbol.clone(), 10.0, 110.0));

        let positions = provider.get_positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].direction, Direction::Long);
        assert_eq!(positions[0].quantity, 20.0);
        assert_eq!(positions[0].average_price, 105.0);

        provider.place_sell_order(&OrderRequest::market(symbol.clone(), 20.0, 120.0));
        assert!(provider.get_positions().is_empty());
    }
}
