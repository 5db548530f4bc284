//! Integration test: ChannelTransport <-> SimulatedBackend
//!
//! Drives the backend through the `Transport` port the way the sync layer
//! does: start the pump, connect, trade, and read the snapshot getters.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tradedesk_clock::SystemClock;
use tradedesk_core::{ConnectionPhase, OrderStatus, SyncEvent, TradeType};
use tradedesk_gateway::{GatewayConfig, SimulatorConfig, SymbolConfig, spawn_simulated};
use tradedesk_ports::{EventSink, Transport, TransportError};

fn config() -> GatewayConfig {
    GatewayConfig {
        channel_capacity: 256,
        request_timeout_ms: 1_000,
        simulator: SimulatorConfig {
            symbols: vec![SymbolConfig {
                symbol: "AAPL".to_string(),
                price: dec!(190),
            }],
            tick_interval_ms: 10,
            fill_latency_ms: 20,
            seed: Some(7),
            ..Default::default()
        },
    }
}

fn channel_sink() -> (Arc<dyn EventSink>, mpsc::UnboundedReceiver<SyncEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn EventSink> = Arc::new(move |event: SyncEvent| {
        let _ = tx.send(event);
    });
    (sink, rx)
}

async fn wait_for<F>(rx: &mut mpsc::UnboundedReceiver<SyncEvent>, mut pred: F) -> SyncEvent
where
    F: FnMut(&SyncEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("feed closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_connect_quote_and_fill() {
    let _ = env_logger::try_init();

    let (transport, backend) = spawn_simulated(&config(), Arc::new(SystemClock::new())).unwrap();
    let (sink, mut rx) = channel_sink();
    transport.start(sink).await.unwrap();

    transport.connect().await.unwrap();
    wait_for(&mut rx, |e| {
        matches!(e, SyncEvent::ConnectionStatus(s) if s.phase == ConnectionPhase::Connected)
    })
    .await;

    wait_for(&mut rx, |e| matches!(e, SyncEvent::MarketData(q) if q.symbol == "AAPL")).await;
    assert_eq!(transport.market_data().len(), 1);

    let ack = transport
        .place_quick_order("AAPL", TradeType::Buy, dec!(10))
        .await
        .unwrap();
    assert!(ack.success);
    let order_id = ack.order_id.expect("order id");

    wait_for(&mut rx, |e| {
        matches!(e, SyncEvent::OrderUpdate(o) if o.id == order_id && o.status == OrderStatus::Executed)
    })
    .await;
    wait_for(&mut rx, |e| matches!(e, SyncEvent::PositionUpdate(p) if p.symbol == "AAPL")).await;

    let positions = transport.positions();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].quantity, dec!(10));

    transport.stop();
    backend.shutdown().await;
}

#[tokio::test]
async fn test_rejections_and_failures() {
    let (transport, backend) = spawn_simulated(&config(), Arc::new(SystemClock::new())).unwrap();

    // Refresh before connecting is a transport failure
    let err = transport.refresh().await.unwrap_err();
    assert!(matches!(err, TransportError::Refresh(_)));

    transport.connect().await.unwrap();

    let ack = transport
        .place_quick_order("TSLA", TradeType::Sell, dec!(1))
        .await
        .unwrap();
    assert!(!ack.success);
    assert_eq!(ack.message, "Unknown symbol TSLA");

    let ack = transport.close_position("AAPL").await.unwrap();
    assert!(!ack.success);

    backend.shutdown().await;
}

#[tokio::test]
async fn test_connect_failure_is_reported() {
    let mut config = config();
    config.simulator.connect_failures = 1;
    let (transport, backend) = spawn_simulated(&config, Arc::new(SystemClock::new())).unwrap();

    let err = transport.connect().await.unwrap_err();
    assert_eq!(
        err,
        TransportError::Connection("Simulated connect failure".to_string())
    );
    let (sink, mut rx) = channel_sink();
    transport.start(sink).await.unwrap();
    transport.reconnect().await.unwrap();
    wait_for(&mut rx, |e| {
        matches!(e, SyncEvent::ConnectionStatus(s) if s.phase == ConnectionPhase::Connected)
    })
    .await;
    assert_eq!(transport.connection_status().phase, ConnectionPhase::Connected);

    backend.shutdown().await;
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let mut config = config();
    config.simulator.symbols.clear();
    assert!(spawn_simulated(&config, Arc::new(SystemClock::new())).is_err());
}
