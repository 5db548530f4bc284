//! Tradedesk Core Domain
//!
//! Pure domain types for the dashboard synchronization layer: the three
//! projected entities (quotes, positions, orders), the connection lifecycle,
//! and the event union the transport delivers.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod events;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    ConnectionPhase, ConnectionState, Keyed, Ohlc, Order, OrderId, OrderStatus, OrderType,
    Position, Quote, TradeType,
};
pub use events::{EntityKind, ErrorNotice, SyncEvent};
pub use values::{Price, Quantity, Symbol, Timestamp};
