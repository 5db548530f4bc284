//! Test doubles shared by the unit tests

use crate::commands::CommandKind;
use crate::reporter::{ErrorReporter, Notifier};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tradedesk_core::{
    ConnectionState, ErrorNotice, Order, OrderType, Position, Quote, SyncEvent, TradeType,
};
use tradedesk_ports::{CommandAck, EventSink, Transport, TransportError, TransportResult};

pub(crate) fn quote(symbol: &str, price: Decimal) -> Quote {
    Quote::new(symbol, price, price, price, Decimal::ONE, Utc::now())
}

pub(crate) fn position(symbol: &str, quantity: Decimal) -> Position {
    Position::open(symbol, TradeType::Buy, quantity, Decimal::ONE_HUNDRED, Utc::now())
}

pub(crate) fn order(id: &str, symbol: &str) -> Order {
    Order::pending(
        id,
        symbol,
        OrderType::Market,
        TradeType::Buy,
        Decimal::ONE,
        Utc::now(),
    )
}

/// Fake transport that records every call
#[derive(Default)]
pub(crate) struct RecordingTransport {
    sink: Mutex<Option<Arc<dyn EventSink>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    reconnects: AtomicUsize,
    refreshes: AtomicUsize,
    commands: Mutex<Vec<String>>,
    start_error: Mutex<Option<TransportError>>,
    connect_error: Mutex<Option<TransportError>>,
    refresh_error: Mutex<Option<TransportError>>,
    command_error: Mutex<Option<TransportError>>,
    command_ack: Mutex<Option<CommandAck>>,
    command_delay: Mutex<Option<Duration>>,
    start_delay: Mutex<Option<Duration>>,
    quotes: Mutex<Vec<Quote>>,
    status: Mutex<ConnectionState>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Push an event into the sink given to `start`, if started
    pub(crate) fn emit(&self, event: SyncEvent) {
        let sink = self.sink.lock().unwrap().clone();
        if let Some(sink) = sink {
            sink.deliver(event);
        }
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn fail_start(&self, error: TransportError) {
        *self.start_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn clear_start_failure(&self) {
        *self.start_error.lock().unwrap() = None;
    }

    pub(crate) fn fail_connect(&self, error: TransportError) {
        *self.connect_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn clear_connect_failure(&self) {
        *self.connect_error.lock().unwrap() = None;
    }

    pub(crate) fn fail_refresh(&self, error: TransportError) {
        *self.refresh_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn fail_commands(&self, error: TransportError) {
        *self.command_error.lock().unwrap() = Some(error);
    }

    pub(crate) fn answer_commands(&self, ack: CommandAck) {
        *self.command_ack.lock().unwrap() = Some(ack);
    }

    pub(crate) fn delay_commands(&self, delay: Duration) {
        *self.command_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn delay_start(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = Some(delay);
    }

    /// Whether `start` installed a sink that `stop` has not removed
    pub(crate) fn has_sink(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    pub(crate) fn set_quotes(&self, quotes: Vec<Quote>) {
        *self.quotes.lock().unwrap() = quotes;
    }

    pub(crate) fn set_status(&self, status: ConnectionState) {
        *self.status.lock().unwrap() = status;
    }

    async fn command(&self, name: String) -> TransportResult<CommandAck> {
        self.commands.lock().unwrap().push(name.clone());
        let delay = *self.command_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.command_error.lock().unwrap().clone() {
            return Err(error);
        }
        let ack = self.command_ack.lock().unwrap().clone();
        Ok(ack.unwrap_or_else(|| CommandAck::ok(format!("{} done", name))))
    }

    fn lifecycle(&self, counter: &AtomicUsize, error: &Mutex<Option<TransportError>>) -> TransportResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        match error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn start(&self, sink: Arc<dyn EventSink>) -> TransportResult<()> {
        let delay = *self.start_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.lifecycle(&self.starts, &self.start_error)?;
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = None;
    }

    async fn connect(&self) -> TransportResult<()> {
        self.lifecycle(&self.connects, &self.connect_error)
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reconnect(&self) -> TransportResult<()> {
        self.lifecycle(&self.reconnects, &self.connect_error)
    }

    async fn refresh(&self) -> TransportResult<()> {
        self.lifecycle(&self.refreshes, &self.refresh_error)
    }

    fn market_data(&self) -> Vec<Quote> {
        self.quotes.lock().unwrap().clone()
    }

    fn positions(&self) -> Vec<Position> {
        Vec::new()
    }

    fn orders(&self) -> Vec<Order> {
        Vec::new()
    }

    fn connection_status(&self) -> ConnectionState {
        *self.status.lock().unwrap()
    }

    async fn place_quick_order(
        &self,
        symbol: &str,
        action: TradeType,
        quantity: Decimal,
    ) -> TransportResult<CommandAck> {
        self.command(format!("place_quick_order:{}:{}:{}", symbol, action, quantity))
            .await
    }

    async fn cancel_order(&self, order_id: &str) -> TransportResult<CommandAck> {
        self.command(format!("cancel_order:{}", order_id)).await
    }

    async fn close_position(&self, symbol: &str) -> TransportResult<CommandAck> {
        self.command(format!("close_position:{}", symbol)).await
    }

    async fn start_trading(&self) -> TransportResult<CommandAck> {
        self.command("start_trading".to_string()).await
    }

    async fn stop_trading(&self) -> TransportResult<CommandAck> {
        self.command("stop_trading".to_string()).await
    }

    async fn emergency_stop(&self) -> TransportResult<CommandAck> {
        self.command("emergency_stop".to_string()).await
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    kinds: Mutex<Vec<CommandKind>>,
}

impl RecordingNotifier {
    pub(crate) fn kinds(&self) -> Vec<CommandKind> {
        self.kinds.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, kind: CommandKind, _message: &str) {
        self.kinds.lock().unwrap().push(kind);
    }
}

#[derive(Default)]
pub(crate) struct RecordingReporter {
    notices: Mutex<Vec<ErrorNotice>>,
}

impl RecordingReporter {
    pub(crate) fn notices(&self) -> Vec<ErrorNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, notice: &ErrorNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}
