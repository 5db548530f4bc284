//! `Transport` over tokio channels
//!
//! Events arrive on a broadcast channel fed by the backend; a pump task
//! forwards each one into the sink handed to `start`. Lifecycle operations and
//! commands are request/reply messages. The pump also keeps a snapshot cache
//! for the synchronous getters; it only lives as long as the pump, so `stop`
//! empties it.

use crate::messages::{GatewayReply, GatewayRequest};
use crate::transport::Requester;
use crate::transport::Subscriber;
use crate::transport::channel::{ChannelPublisher, ChannelRequester};
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tradedesk_core::{
    ConnectionState, Keyed, Order, Position, Quantity, Quote, SyncEvent, TradeType,
};
use tradedesk_ports::{CommandAck, EventSink, Transport, TransportError, TransportResult};

/// Last-seen state, kept current by the pump task
#[derive(Default)]
struct SnapshotCache {
    quotes: DashMap<String, Quote>,
    positions: DashMap<String, Position>,
    orders: DashMap<String, Order>,
    connection: RwLock<ConnectionState>,
}

impl SnapshotCache {
    fn record(&self, event: &SyncEvent) {
        match event {
            SyncEvent::MarketData(quote) => {
                self.quotes.insert(quote.key().to_string(), quote.clone());
            }
            SyncEvent::PositionUpdate(position) => {
                self.positions
                    .insert(position.key().to_string(), position.clone());
            }
            SyncEvent::OrderUpdate(order) => {
                self.orders.insert(order.key().to_string(), order.clone());
            }
            SyncEvent::ConnectionStatus(state) => {
                let mut current = self.connection.write().unwrap_or_else(|e| e.into_inner());
                *current = *state;
            }
            SyncEvent::Error(_) => {}
        }
    }

    fn clear(&self) {
        self.quotes.clear();
        self.positions.clear();
        self.orders.clear();
        let mut current = self.connection.write().unwrap_or_else(|e| e.into_inner());
        *current = ConnectionState::disconnected();
    }

    fn sorted<T: Clone>(map: &DashMap<String, T>) -> Vec<T> {
        let mut entries: Vec<(String, T)> = map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, value)| value).collect()
    }
}

/// Channel-backed transport collaborator
pub struct ChannelTransport {
    feed: ChannelPublisher<SyncEvent>,
    requester: ChannelRequester<GatewayRequest, GatewayReply>,
    request_timeout: Duration,
    cache: Arc<SnapshotCache>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelTransport {
    /// Create a transport reading events from `feed` and sending requests
    /// through `requester`
    pub fn new(
        feed: ChannelPublisher<SyncEvent>,
        requester: ChannelRequester<GatewayRequest, GatewayReply>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            feed,
            requester,
            request_timeout,
            cache: Arc::new(SnapshotCache::default()),
            pump: Mutex::new(None),
        }
    }

    /// Whether the pump task is currently forwarding events
    pub fn is_running(&self) -> bool {
        let pump = self.pump.lock().unwrap_or_else(|e| e.into_inner());
        pump.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn call(&self, request: GatewayRequest) -> TransportResult<GatewayReply> {
        debug!("Sending {} request", request.name());
        tokio::time::timeout(self.request_timeout, self.requester.request(&request))
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn lifecycle(
        &self,
        request: GatewayRequest,
        on_failure: fn(String) -> TransportError,
    ) -> TransportResult<()> {
        match self.call(request).await? {
            GatewayReply::Done | GatewayReply::Ack(_) => Ok(()),
            GatewayReply::Failed { message } => Err(on_failure(message)),
        }
    }

    async fn command(&self, request: GatewayRequest) -> TransportResult<CommandAck> {
        match self.call(request).await? {
            GatewayReply::Ack(ack) => Ok(ack),
            GatewayReply::Done => Ok(CommandAck::ok("done")),
            GatewayReply::Failed { message } => Err(TransportError::Command(message)),
        }
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn start(&self, sink: Arc<dyn EventSink>) -> TransportResult<()> {
        let mut pump = self.pump.lock().unwrap_or_else(|e| e.into_inner());
        if pump.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Channel transport already started");
            return Ok(());
        }

        let mut subscriber = self.feed.subscribe();
        let cache = Arc::clone(&self.cache);
        let handle = tokio::spawn(async move {
            loop {
                match subscriber.next().await {
                    Ok(event) => {
                        cache.record(&event);
                        sink.deliver(event);
                    }
                    Err(e) => {
                        warn!("Event feed ended: {}", e);
                        break;
                    }
                }
            }
        });
        *pump = Some(handle);
        info!("Channel transport started");
        Ok(())
    }

    fn stop(&self) {
        let mut pump = self.pump.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = pump.take() {
            handle.abort();
            info!("Channel transport stopped");
        }
        self.cache.clear();
    }

    async fn connect(&self) -> TransportResult<()> {
        self.lifecycle(GatewayRequest::Connect, TransportError::Connection)
            .await
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.lifecycle(GatewayRequest::Disconnect, TransportError::Connection)
            .await
    }

    async fn reconnect(&self) -> TransportResult<()> {
        self.lifecycle(GatewayRequest::Reconnect, TransportError::Connection)
            .await
    }

    async fn refresh(&self) -> TransportResult<()> {
        self.lifecycle(GatewayRequest::Refresh, TransportError::Refresh)
            .await
    }

    fn market_data(&self) -> Vec<Quote> {
        SnapshotCache::sorted(&self.cache.quotes)
    }

    fn positions(&self) -> Vec<Position> {
        SnapshotCache::sorted(&self.cache.positions)
    }

    fn orders(&self) -> Vec<Order> {
        SnapshotCache::sorted(&self.cache.orders)
    }

    fn connection_status(&self) -> ConnectionState {
        *self
            .cache
            .connection
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    async fn place_quick_order(
        &self,
        symbol: &str,
        action: TradeType,
        quantity: Quantity,
    ) -> TransportResult<CommandAck> {
        self.command(GatewayRequest::PlaceQuickOrder {
            symbol: symbol.to_string(),
            action,
            quantity,
        })
        .await
    }

    async fn cancel_order(&self, order_id: &str) -> TransportResult<CommandAck> {
        self.command(GatewayRequest::CancelOrder {
            order_id: order_id.to_string(),
        })
        .await
    }

    async fn close_position(&self, symbol: &str) -> TransportResult<CommandAck> {
        self.command(GatewayRequest::ClosePosition {
            symbol: symbol.to_string(),
        })
        .await
    }

    async fn start_trading(&self) -> TransportResult<CommandAck> {
        self.command(GatewayRequest::StartTrading).await
    }

    async fn stop_trading(&self) -> TransportResult<CommandAck> {
        self.command(GatewayRequest::StopTrading).await
    }

    async fn emergency_stop(&self) -> TransportResult<CommandAck> {
        self.command(GatewayRequest::EmergencyStop).await
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;
    use tradedesk_core::ConnectionPhase;

    fn transport_pair() -> (
        ChannelTransport,
        ChannelPublisher<SyncEvent>,
        crate::transport::channel::ChannelResponder<GatewayRequest, GatewayReply>,
    ) {
        let feed = ChannelPublisher::new(16);
        let (requester, responder) = ChannelRequester::pair(16);
        let transport = ChannelTransport::new(feed.clone(), requester, Duration::from_millis(200));
        (transport, feed, responder)
    }

    fn channel_sink() -> (Arc<dyn EventSink>, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink: Arc<dyn EventSink> = Arc::new(move |event: SyncEvent| {
            let _ = tx.send(event);
        });
        (sink, rx)
    }

    #[tokio::test]
    async fn test_pump_forwards_and_caches() {
        let (transport, feed, _responder) = transport_pair();
        let (sink, mut rx) = channel_sink();

        transport.start(sink).await.unwrap();
        assert!(transport.is_running());

        let quote = Quote::new("AAPL", dec!(190), dec!(189.99), dec!(190.01), dec!(10), Utc::now());
        feed.send(SyncEvent::MarketData(quote.clone()));
        feed.send(SyncEvent::ConnectionStatus(ConnectionState::new(
            ConnectionPhase::Connecting,
            None,
        )));

        assert_eq!(rx.recv().await, Some(SyncEvent::MarketData(quote.clone())));
        assert!(matches!(rx.recv().await, Some(SyncEvent::ConnectionStatus(_))));
        assert_eq!(transport.market_data(), vec![quote]);
        assert_eq!(
            transport.connection_status().phase,
            ConnectionPhase::Connecting
        );
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (transport, feed, _responder) = transport_pair();
        let (sink, mut rx) = channel_sink();

        transport.start(sink.clone()).await.unwrap();
        transport.start(sink).await.unwrap();

        feed.send(SyncEvent::error("once"));
        assert_eq!(rx.recv().await, Some(SyncEvent::error("once")));
        // A second pump would have delivered a duplicate
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_halts_delivery() {
        let (transport, feed, _responder) = transport_pair();
        let (sink, mut rx) = channel_sink();

        transport.start(sink).await.unwrap();
        transport.stop();
        tokio::task::yield_now().await;

        assert!(!transport.is_running());
        feed.send(SyncEvent::error("late"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stop_forgets_cached_snapshot() {
        let (transport, feed, _responder) = transport_pair();
        let (sink, mut rx) = channel_sink();
        transport.start(sink.clone()).await.unwrap();

        let quote = Quote::new("AAPL", dec!(190), dec!(189.99), dec!(190.01), dec!(10), Utc::now());
        feed.send(SyncEvent::MarketData(quote));
        feed.send(SyncEvent::ConnectionStatus(ConnectionState::new(
            ConnectionPhase::Connected,
            Some(Utc::now()),
        )));
        rx.recv().await;
        rx.recv().await;
        assert_eq!(transport.market_data().len(), 1);

        transport.stop();
        assert!(transport.market_data().is_empty());
        assert!(transport.positions().is_empty());
        assert!(transport.orders().is_empty());
        assert_eq!(
            transport.connection_status().phase,
            ConnectionPhase::Disconnected
        );

        // A restarted pump starts from an empty cache
        transport.start(sink).await.unwrap();
        assert!(transport.market_data().is_empty());
    }

    #[tokio::test]
    async fn test_command_failure_keeps_message() {
        let (transport, _feed, mut responder) = transport_pair();

        tokio::spawn(async move {
            if let Some((_, reply)) = responder.next().await {
                let _ = reply.send(GatewayReply::failed("order o1 not found"));
            }
        });

        let err = transport.cancel_order("o1").await.unwrap_err();
        assert_eq!(err, TransportError::Command("order o1 not found".to_string()));
        assert_eq!(err.to_string(), "order o1 not found");
    }

    #[tokio::test]
    async fn test_request_times_out_without_backend_reply() {
        let (transport, _feed, mut responder) = transport_pair();

        // Hold requests without replying
        let _held = tokio::spawn(async move {
            let mut pending = Vec::new();
            while let Some(req) = responder.next().await {
                pending.push(req);
            }
        });

        let err = transport.refresh().await.unwrap_err();
        assert_eq!(err, TransportError::Timeout);
    }
}
