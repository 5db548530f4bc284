//! Simulated trading backend
//!
//! Serves the responder side of a `ChannelTransport`: quotes every symbol on
//! each tick, fills quick orders after a configurable latency, tracks the
//! resulting positions, and reports its own connection lifecycle as
//! `connection_status` events.

use super::market::PriceWalk;
use crate::config::SimulatorConfig;
use crate::messages::{GatewayReply, GatewayRequest};
use crate::transport::channel::{ChannelPublisher, ChannelResponder};
use chrono::Duration;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tradedesk_core::{
    ConnectionPhase, ConnectionState, Order, OrderStatus, OrderType, Position, Price, Quantity,
    SyncEvent, Timestamp, TradeType,
};
use tradedesk_ports::{Clock, CommandAck};
use uuid::Uuid;

/// Quick order waiting for its simulated fill
#[derive(Debug, Clone)]
struct PendingFill {
    order_id: String,
    due: Timestamp,
}

/// In-process backend that owns the authoritative quotes, positions and orders
pub struct SimulatedBackend {
    config: SimulatorConfig,
    feed: ChannelPublisher<SyncEvent>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    markets: BTreeMap<String, PriceWalk>,
    positions: BTreeMap<String, Position>,
    orders: BTreeMap<String, Order>,
    pending_fills: Vec<PendingFill>,
    phase: ConnectionPhase,
    last_connected_at: Option<Timestamp>,
    trading_enabled: bool,
    connect_failures_left: u32,
    ticks: u64,
}

impl SimulatedBackend {
    /// Create a backend publishing its events on `feed`
    pub fn new(
        config: SimulatorConfig,
        feed: ChannelPublisher<SyncEvent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let markets = config
            .symbols
            .iter()
            .map(|s| (s.symbol.clone(), PriceWalk::new(s.symbol.clone(), s.price)))
            .collect();

        Self {
            connect_failures_left: config.connect_failures,
            config,
            feed,
            clock,
            rng,
            markets,
            positions: BTreeMap::new(),
            orders: BTreeMap::new(),
            pending_fills: Vec::new(),
            phase: ConnectionPhase::Disconnected,
            last_connected_at: None,
            trading_enabled: false,
            ticks: 0,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn is_trading(&self) -> bool {
        self.trading_enabled
    }

    pub fn order(&self, order_id: &str) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Serve requests and tick until the responder closes or `shutdown` fires
    pub async fn run(
        mut self,
        mut responder: ChannelResponder<GatewayRequest, GatewayReply>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let period = std::time::Duration::from_millis(self.config.tick_interval_ms.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            "Simulated backend running: {} symbols, tick every {:?}",
            self.markets.len(),
            period
        );

        loop {
            tokio::select! {
                request = responder.next() => match request {
                    Some((request, reply_tx)) => {
                        let reply = self.handle(request);
                        if reply_tx.send(reply).is_err() {
                            debug!("Requester went away before the reply");
                        }
                    }
                    None => break,
                },
                _ = interval.tick() => self.tick(),
                _ = &mut shutdown => break,
            }
        }

        info!("Simulated backend stopped after {} ticks", self.ticks);
    }

    /// Handle one lifecycle or command request
    pub fn handle(&mut self, request: GatewayRequest) -> GatewayReply {
        debug!("Backend handling {}", request.name());
        match request {
            GatewayRequest::Connect | GatewayRequest::Reconnect => self.connect(),
            GatewayRequest::Disconnect => {
                if self.phase != ConnectionPhase::Disconnected {
                    self.set_phase(ConnectionPhase::Disconnected);
                }
                GatewayReply::Done
            }
            GatewayRequest::Refresh => self.refresh(),
            GatewayRequest::PlaceQuickOrder {
                symbol,
                action,
                quantity,
            } => self.require_connected(|backend| {
                backend.place_quick_order(&symbol, action, quantity)
            }),
            GatewayRequest::CancelOrder { order_id } => {
                self.require_connected(|backend| backend.cancel_order(&order_id))
            }
            GatewayRequest::ClosePosition { symbol } => {
                self.require_connected(|backend| backend.close_position(&symbol))
            }
            GatewayRequest::StartTrading => self.require_connected(|backend| {
                backend.trading_enabled = true;
                CommandAck::ok("Trading started")
            }),
            GatewayRequest::StopTrading => self.require_connected(|backend| {
                backend.trading_enabled = false;
                CommandAck::ok("Trading stopped")
            }),
            GatewayRequest::EmergencyStop => self.require_connected(|backend| backend.emergency_stop()),
        }
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self) {
        self.ticks += 1;

        match self.phase {
            ConnectionPhase::Reconnecting => {
                // Recover from the simulated drop on the following tick
                self.mark_connected();
                return;
            }
            ConnectionPhase::Connected => {}
            _ => return,
        }

        let drop_now = self
            .config
            .drop_every_ticks
            .is_some_and(|every| every > 0 && self.ticks % every == 0);
        if drop_now {
            warn!("Simulating connection drop at tick {}", self.ticks);
            self.set_phase(ConnectionPhase::Reconnecting);
            return;
        }

        let now = self.clock.now();
        let symbols: Vec<String> = self.markets.keys().cloned().collect();
        for symbol in symbols {
            let quote = match self.markets.get_mut(&symbol) {
                Some(walk) => walk.step(
                    &mut self.rng,
                    self.config.max_step_bps,
                    self.config.spread,
                    now,
                ),
                None => continue,
            };
            let last = quote.last_price;
            self.emit(SyncEvent::MarketData(quote));

            let marked = match self.positions.get_mut(&symbol) {
                Some(position) if !position.is_closed() => {
                    position.mark(last, now);
                    Some(position.clone())
                }
                _ => None,
            };
            if let Some(update) = marked {
                self.emit(SyncEvent::PositionUpdate(update));
            }
        }

        self.process_fills(now);
    }

    fn connect(&mut self) -> GatewayReply {
        if self.phase == ConnectionPhase::Connected {
            return GatewayReply::Done;
        }

        self.set_phase(ConnectionPhase::Connecting);
        if self.connect_failures_left > 0 {
            self.connect_failures_left -= 1;
            self.set_phase(ConnectionPhase::Failed);
            return GatewayReply::failed("Simulated connect failure");
        }

        self.mark_connected();
        GatewayReply::Done
    }

    fn refresh(&mut self) -> GatewayReply {
        if !self.phase.is_connected() {
            return GatewayReply::failed(format!("Cannot refresh while {}", self.phase));
        }

        let now = self.clock.now();
        let quotes: Vec<_> = self
            .markets
            .values()
            .map(|walk| walk.quote(self.config.spread, now))
            .collect();
        for quote in quotes {
            self.emit(SyncEvent::MarketData(quote));
        }
        for position in self.positions.values() {
            self.emit(SyncEvent::PositionUpdate(position.clone()));
        }
        for order in self.orders.values() {
            self.emit(SyncEvent::OrderUpdate(order.clone()));
        }
        GatewayReply::Done
    }

    fn require_connected(
        &mut self,
        command: impl FnOnce(&mut Self) -> CommandAck,
    ) -> GatewayReply {
        if !self.phase.is_connected() {
            return GatewayReply::failed(format!("Backend is {}", self.phase));
        }
        GatewayReply::Ack(command(self))
    }

    fn place_quick_order(
        &mut self,
        symbol: &str,
        action: TradeType,
        quantity: Quantity,
    ) -> CommandAck {
        if quantity <= Decimal::ZERO {
            return CommandAck::rejected("Quantity must be positive");
        }
        if !self.markets.contains_key(symbol) {
            return CommandAck::rejected(format!("Unknown symbol {}", symbol));
        }

        let now = self.clock.now();
        let order_id = Uuid::new_v4().to_string();
        let order = Order::pending(
            order_id.clone(),
            symbol,
            OrderType::Market,
            action,
            quantity,
            now,
        );
        self.orders.insert(order_id.clone(), order.clone());
        self.pending_fills.push(PendingFill {
            order_id: order_id.clone(),
            due: now + Duration::milliseconds(self.config.fill_latency_ms as i64),
        });
        self.emit(SyncEvent::OrderUpdate(order));

        info!("Accepted {} {} {} as {}", action, quantity, symbol, order_id);
        CommandAck::ok(format!("{} {} {} accepted", action, quantity, symbol))
            .with_order_id(order_id)
    }

    fn cancel_order(&mut self, order_id: &str) -> CommandAck {
        let now = self.clock.now();
        let Some(order) = self.orders.get_mut(order_id) else {
            return CommandAck::rejected(format!("Order {} not found", order_id));
        };
        if !order.status.is_active() {
            return CommandAck::rejected(format!(
                "Order {} is already {:?}",
                order_id, order.status
            ));
        }

        order.finish(OrderStatus::Cancelled, now);
        let update = order.clone();
        self.pending_fills.retain(|fill| fill.order_id != order_id);
        self.emit(SyncEvent::OrderUpdate(update));
        CommandAck::ok(format!("Order {} cancelled", order_id)).with_order_id(order_id)
    }

    fn close_position(&mut self, symbol: &str) -> CommandAck {
        match self.flatten(symbol) {
            true => CommandAck::ok(format!("Position {} closed", symbol)),
            false => CommandAck::rejected(format!("No open position in {}", symbol)),
        }
    }

    fn emergency_stop(&mut self) -> CommandAck {
        self.trading_enabled = false;

        let now = self.clock.now();
        let active: Vec<String> = self
            .orders
            .values()
            .filter(|order| order.status.is_active())
            .map(|order| order.id.clone())
            .collect();
        for order_id in &active {
            if let Some(order) = self.orders.get_mut(order_id) {
                order.finish(OrderStatus::Cancelled, now);
                let update = order.clone();
                self.emit(SyncEvent::OrderUpdate(update));
            }
        }
        self.pending_fills.clear();

        let open: Vec<String> = self
            .positions
            .values()
            .filter(|position| !position.is_closed())
            .map(|position| position.symbol.clone())
            .collect();
        for symbol in &open {
            self.flatten(symbol);
        }

        warn!(
            "Emergency stop: cancelled {} orders, closed {} positions",
            active.len(),
            open.len()
        );
        CommandAck::ok(format!(
            "Emergency stop: cancelled {} orders, closed {} positions",
            active.len(),
            open.len()
        ))
    }

    /// Emit a terminal zero-quantity update for an open position
    fn flatten(&mut self, symbol: &str) -> bool {
        let now = self.clock.now();
        let price = self.markets.get(symbol).map(PriceWalk::last);
        match self.positions.get_mut(symbol) {
            Some(position) if !position.is_closed() => {
                if let Some(price) = price {
                    position.mark(price, now);
                }
                let closed = position.clone().closed(now);
                *position = closed.clone();
                self.emit(SyncEvent::PositionUpdate(closed));
                true
            }
            _ => false,
        }
    }

    fn process_fills(&mut self, now: Timestamp) {
        let (due, waiting): (Vec<_>, Vec<_>) = self
            .pending_fills
            .drain(..)
            .partition(|fill| fill.due <= now);
        self.pending_fills = waiting;

        for fill in due {
            let Some(order) = self.orders.get_mut(&fill.order_id) else {
                continue;
            };
            let Some(price) = self.markets.get(&order.symbol).map(PriceWalk::last) else {
                continue;
            };

            let quantity = order.pending_quantity;
            order.fill(quantity, price, now);
            let filled = order.clone();
            self.emit(SyncEvent::OrderUpdate(filled.clone()));

            let position = apply_fill(
                self.positions.get(&filled.symbol),
                &filled.symbol,
                filled.trade_type,
                quantity,
                price,
                now,
            );
            self.positions.insert(filled.symbol.clone(), position.clone());
            self.emit(SyncEvent::PositionUpdate(position));
        }
    }

    fn mark_connected(&mut self) {
        self.last_connected_at = Some(self.clock.now());
        self.set_phase(ConnectionPhase::Connected);
    }

    fn set_phase(&mut self, phase: ConnectionPhase) {
        debug!("Backend {} -> {}", self.phase, phase);
        self.phase = phase;
        self.emit(SyncEvent::ConnectionStatus(ConnectionState::new(
            phase,
            self.last_connected_at,
        )));
    }

    fn emit(&self, event: SyncEvent) {
        if !self.feed.send(event) {
            debug!("No transport listening on the backend feed");
        }
    }
}

/// Fold a fill into the existing position for its symbol
fn apply_fill(
    existing: Option<&Position>,
    symbol: &str,
    side: TradeType,
    quantity: Quantity,
    price: Price,
    now: Timestamp,
) -> Position {
    let signed = match side {
        TradeType::Buy => quantity,
        TradeType::Sell => -quantity,
    };

    let Some(current) = existing.filter(|p| !p.is_closed()) else {
        return Position::open(symbol, side, quantity, price, now);
    };

    let new_quantity = current.quantity + signed;
    if new_quantity.is_zero() {
        let mut flat = current.clone();
        flat.mark(price, now);
        return flat.closed(now);
    }

    let same_direction = (current.quantity > Decimal::ZERO) == (signed > Decimal::ZERO);
    let still_same_side = (current.quantity > Decimal::ZERO) == (new_quantity > Decimal::ZERO);

    let mut next = if same_direction {
        // Adding - weighted average entry
        let mut added = current.clone();
        let cost = current.quantity.abs() * current.average_price + quantity * price;
        added.average_price = (cost / new_quantity.abs()).round_dp(4);
        added.quantity = new_quantity;
        added
    } else if still_same_side {
        // Reducing - entry price unchanged
        let mut reduced = current.clone();
        reduced.quantity = new_quantity;
        reduced
    } else {
        // Flipped through zero - new position at the fill price
        let flipped_side = if new_quantity > Decimal::ZERO {
            TradeType::Buy
        } else {
            TradeType::Sell
        };
        Position::open(symbol, flipped_side, new_quantity.abs(), price, now)
    };

    next.mark(price, now);
    next
}
