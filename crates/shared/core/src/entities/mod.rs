mod connection;
mod order;
mod order_status;
mod order_type;
mod position;
mod quote;
mod side;

pub use connection::{ConnectionPhase, ConnectionState};
pub use order::{Order, OrderId};
pub use order_status::OrderStatus;
pub use order_type::OrderType;
pub use position::Position;
pub use quote::{Ohlc, Quote};
pub use side::TradeType;

/// An entity with a stable key inside its collection
///
/// Quotes and positions are keyed by symbol, orders by id.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Quote {
    fn key(&self) -> &str {
        &self.symbol
    }
}

impl Keyed for Position {
    fn key(&self) -> &str {
        &self.symbol
    }
}

impl Keyed for Order {
    fn key(&self) -> &str {
        &self.id
    }
}
