//! Lifecycle and command request types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradedesk_core::TradeType;
use tradedesk_ports::CommandAck;

/// Everything a consumer can ask of the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GatewayRequest {
    Connect,
    Disconnect,
    Reconnect,
    /// Re-emit all authoritative state as events
    Refresh,
    PlaceQuickOrder {
        symbol: String,
        action: TradeType,
        quantity: Decimal,
    },
    CancelOrder {
        order_id: String,
    },
    ClosePosition {
        symbol: String,
    },
    StartTrading,
    StopTrading,
    EmergencyStop,
}

impl GatewayRequest {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Reconnect => "reconnect",
            Self::Refresh => "refresh",
            Self::PlaceQuickOrder { .. } => "place_quick_order",
            Self::CancelOrder { .. } => "cancel_order",
            Self::ClosePosition { .. } => "close_position",
            Self::StartTrading => "start_trading",
            Self::StopTrading => "stop_trading",
            Self::EmergencyStop => "emergency_stop",
        }
    }
}

/// Backend reply to a `GatewayRequest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GatewayReply {
    /// Lifecycle operation completed
    Done,
    /// Command acknowledged (possibly with `success: false`)
    Ack(CommandAck),
    /// The operation could not be carried out at all
    Failed { message: String },
}

impl GatewayReply {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}
