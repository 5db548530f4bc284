use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tradedesk_core::{ConnectionState, Order, Position, Quantity, Quote, SyncEvent, TradeType};

use crate::error::TransportResult;

/// Receiver of raw events pushed by a transport
///
/// `deliver` is called synchronously, once per event, in arrival order.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: SyncEvent);
}

impl<F> EventSink for F
where
    F: Fn(SyncEvent) + Send + Sync,
{
    fn deliver(&self, event: SyncEvent) {
        self(event)
    }
}

/// Backend acknowledgement of a one-shot command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub success: bool,
    pub message: String,
    /// Id of the affected order when the command created or touched one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl CommandAck {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            order_id: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            order_id: None,
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }
}

/// The transport collaborator: carries events in and commands out
///
/// The wire technology (socket, long-poll, IPC channel) is the implementor's
/// business. Lifecycle and commands may suspend; snapshot getters are
/// synchronous reads of whatever the transport last saw, used to hydrate
/// projections before the first event arrives.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begin pushing events into `sink`. Idempotent while started.
    async fn start(&self, sink: Arc<dyn EventSink>) -> TransportResult<()>;

    /// Stop pushing events and release the underlying connection
    fn stop(&self);

    async fn connect(&self) -> TransportResult<()>;

    async fn disconnect(&self) -> TransportResult<()>;

    async fn reconnect(&self) -> TransportResult<()>;

    /// Force a resync pass; the backend re-emits authoritative state as events
    async fn refresh(&self) -> TransportResult<()>;

    fn market_data(&self) -> Vec<Quote>;

    fn positions(&self) -> Vec<Position>;

    fn orders(&self) -> Vec<Order>;

    fn connection_status(&self) -> ConnectionState;

    async fn place_quick_order(
        &self,
        symbol: &str,
        action: TradeType,
        quantity: Quantity,
    ) -> TransportResult<CommandAck>;

    async fn cancel_order(&self, order_id: &str) -> TransportResult<CommandAck>;

    async fn close_position(&self, symbol: &str) -> TransportResult<CommandAck>;

    async fn start_trading(&self) -> TransportResult<CommandAck>;

    async fn stop_trading(&self) -> TransportResult<CommandAck>;

    async fn emergency_stop(&self) -> TransportResult<CommandAck>;
}
