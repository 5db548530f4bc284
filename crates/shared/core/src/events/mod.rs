//! Inbound domain events
//!
//! Every event the transport produces is one `SyncEvent`. Its JSON form is
//! `{ "type": "market_data", "data": { ... } }`.

use serde::{Deserialize, Serialize};

use crate::entities::{ConnectionState, Order, Position, Quote};

/// Error notification pushed by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorNotice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for ErrorNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Discriminated union of everything delivered through the fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SyncEvent {
    MarketData(Quote),
    PositionUpdate(Position),
    OrderUpdate(Order),
    ConnectionStatus(ConnectionState),
    Error(ErrorNotice),
}

impl SyncEvent {
    /// Wire name of the event type
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::MarketData(_) => "market_data",
            SyncEvent::PositionUpdate(_) => "position_update",
            SyncEvent::OrderUpdate(_) => "order_update",
            SyncEvent::ConnectionStatus(_) => "connection_status",
            SyncEvent::Error(_) => "error",
        }
    }

    /// Which projected collection this event updates, if any
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            SyncEvent::MarketData(_) => Some(EntityKind::Quotes),
            SyncEvent::PositionUpdate(_) => Some(EntityKind::Positions),
            SyncEvent::OrderUpdate(_) => Some(EntityKind::Orders),
            SyncEvent::ConnectionStatus(_) | SyncEvent::Error(_) => None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SyncEvent::Error(ErrorNotice::new(message))
    }
}

/// The three projected collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Quotes,
    Positions,
    Orders,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Quotes => "quotes",
            EntityKind::Positions => "positions",
            EntityKind::Orders => "orders",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
