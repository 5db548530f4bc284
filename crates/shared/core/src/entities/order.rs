use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{OrderStatus, OrderType, TradeType};
use crate::values::{Price, Quantity, Symbol, Timestamp};

/// Backend-assigned order identifier
pub type OrderId = String;

/// Full order snapshot as reported by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub order_type: OrderType,
    pub trade_type: TradeType,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub pending_quantity: Quantity,
    /// Average fill price, zero until something fills
    pub average_price: Price,
    pub status: OrderStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Order {
    /// Create a new pending order with nothing filled
    pub fn pending(
        id: impl Into<OrderId>,
        symbol: impl Into<Symbol>,
        order_type: OrderType,
        trade_type: TradeType,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            order_type,
            trade_type,
            quantity,
            filled_quantity: Decimal::ZERO,
            pending_quantity: quantity,
            average_price: Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Apply a fill, moving to `PartiallyFilled` or `Executed`
    pub fn fill(&mut self, quantity: Quantity, price: Price, timestamp: Timestamp) {
        let fill_qty = quantity.min(self.pending_quantity);
        if fill_qty <= Decimal::ZERO {
            return;
        }

        let filled_cost = self.filled_quantity * self.average_price + fill_qty * price;
        self.filled_quantity += fill_qty;
        self.pending_quantity = self.quantity - self.filled_quantity;
        self.average_price = filled_cost / self.filled_quantity;
        self.status = if self.pending_quantity.is_zero() {
            OrderStatus::Executed
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = timestamp;
    }

    /// Move to a terminal status without filling
    pub fn finish(&mut self, status: OrderStatus, timestamp: Timestamp) {
        self.status = status;
        self.updated_at = timestamp;
    }

    /// Returns true if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }
}
