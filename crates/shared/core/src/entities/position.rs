use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TradeType;
use crate::values::{Price, Quantity, Symbol, Timestamp};

/// Open position in a symbol, as computed by the backend
///
/// Quantity is signed (positive = long, negative = short). A position is
/// closed when the backend emits a terminal zero-quantity update; nothing
/// downstream infers closure from the absence of updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: Symbol,
    pub quantity: Quantity,
    pub average_price: Price,
    pub current_price: Price,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    pub trade_type: TradeType,
    pub entry_time: Timestamp,
    pub last_updated: Timestamp,
}

impl Position {
    /// Open a position at `price`; P&L starts at zero
    pub fn open(
        symbol: impl Into<Symbol>,
        trade_type: TradeType,
        quantity: Quantity,
        price: Price,
        timestamp: Timestamp,
    ) -> Self {
        let quantity = match trade_type {
            TradeType::Buy => quantity.abs(),
            TradeType::Sell => -quantity.abs(),
        };
        Self {
            symbol: symbol.into(),
            quantity,
            average_price: price,
            current_price: price,
            pnl: Decimal::ZERO,
            pnl_percent: Decimal::ZERO,
            trade_type,
            entry_time: timestamp,
            last_updated: timestamp,
        }
    }

    /// Re-mark the position and recompute P&L
    pub fn mark(&mut self, price: Price, timestamp: Timestamp) {
        self.current_price = price;
        self.pnl = self.quantity * (price - self.average_price);
        let cost = (self.quantity * self.average_price).abs();
        self.pnl_percent = if cost.is_zero() {
            Decimal::ZERO
        } else {
            (self.pnl / cost * Decimal::ONE_HUNDRED).round_dp(4)
        };
        self.last_updated = timestamp;
    }

    /// Terminal update for a flattened position
    pub fn closed(mut self, timestamp: Timestamp) -> Self {
        self.quantity = Decimal::ZERO;
        self.pnl = Decimal::ZERO;
        self.pnl_percent = Decimal::ZERO;
        self.last_updated = timestamp;
        self
    }

    /// Check if position is closed (quantity is zero)
    pub fn is_closed(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// Current notional value
    pub fn notional_value(&self) -> Decimal {
        self.quantity.abs() * self.current_price
    }
}
