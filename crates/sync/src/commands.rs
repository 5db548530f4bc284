//! Command facade
//!
//! One-shot trading commands with a fixed lifecycle: mark the kind as loading,
//! call the transport, and on success notify then `refresh()` so projections
//! pull the authoritative result. Failures go straight back to the caller and
//! projected state is never touched optimistically.

use crate::error::CommandError;
use crate::liveness::LivenessToken;
use crate::reporter::{ErrorReporter, Notifier};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tradedesk_core::{ErrorNotice, Quantity, TradeType};
use tradedesk_ports::{CommandAck, Transport, TransportResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    PlaceQuickOrder,
    CancelOrder,
    ClosePosition,
    StartTrading,
    StopTrading,
    EmergencyStop,
}

impl CommandKind {
    pub const COUNT: usize = 6;

    pub const ALL: [CommandKind; Self::COUNT] = [
        CommandKind::PlaceQuickOrder,
        CommandKind::CancelOrder,
        CommandKind::ClosePosition,
        CommandKind::StartTrading,
        CommandKind::StopTrading,
        CommandKind::EmergencyStop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::PlaceQuickOrder => "place_quick_order",
            CommandKind::CancelOrder => "cancel_order",
            CommandKind::ClosePosition => "close_position",
            CommandKind::StartTrading => "start_trading",
            CommandKind::StopTrading => "stop_trading",
            CommandKind::EmergencyStop => "emergency_stop",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-resource marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlightState {
    Idle,
    Pending(u64),
}

/// Table of resources with a command outstanding, keyed by order id or symbol
#[derive(Debug, Default)]
pub struct InFlight {
    pending: DashMap<String, u64>,
    next_request: AtomicU64,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, key: &str) -> InFlightState {
        match self.pending.get(key) {
            Some(request) => InFlightState::Pending(*request),
            None => InFlightState::Idle,
        }
    }

    /// Claim `key`, or return the id of the request already holding it
    pub fn try_acquire(&self, key: &str) -> Result<InFlightClaim<'_>, u64> {
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(held) => Err(*held.get()),
            Entry::Vacant(slot) => {
                let request_id = self.next_request.fetch_add(1, Ordering::Relaxed) + 1;
                slot.insert(request_id);
                Ok(InFlightClaim {
                    table: self,
                    key: key.to_string(),
                    request_id,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Releases its key on drop
#[derive(Debug)]
pub struct InFlightClaim<'a> {
    table: &'a InFlight,
    key: String,
    request_id: u64,
}

impl InFlightClaim<'_> {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        let request_id = self.request_id;
        self.table
            .pending
            .remove_if(&self.key, |_, held| *held == request_id);
    }
}

/// Counts one in-flight call of a kind
struct Loading<'a>(&'a AtomicUsize);

impl<'a> Loading<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct CommandFacade {
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    reporter: Arc<dyn ErrorReporter>,
    liveness: LivenessToken,
    loading: [AtomicUsize; CommandKind::COUNT],
    in_flight: Option<InFlight>,
}

impl CommandFacade {
    pub fn new(
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        reporter: Arc<dyn ErrorReporter>,
        liveness: LivenessToken,
    ) -> Self {
        Self {
            transport,
            notifier,
            reporter,
            liveness,
            loading: Default::default(),
            in_flight: None,
        }
    }

    /// Reject a second command against an order or symbol still pending
    pub fn serialized_per_resource(mut self) -> Self {
        self.in_flight = Some(InFlight::new());
        self
    }

    pub fn is_loading(&self) -> bool {
        CommandKind::ALL.iter().any(|kind| self.is_loading_kind(*kind))
    }

    pub fn is_loading_kind(&self, kind: CommandKind) -> bool {
        self.loading[kind.index()].load(Ordering::Acquire) > 0
    }

    pub fn in_flight_state(&self, key: &str) -> InFlightState {
        self.in_flight
            .as_ref()
            .map_or(InFlightState::Idle, |table| table.state(key))
    }

    pub async fn place_quick_order(
        &self,
        symbol: &str,
        action: TradeType,
        quantity: Quantity,
    ) -> Result<CommandAck, CommandError> {
        self.run(
            CommandKind::PlaceQuickOrder,
            Some(symbol_key(symbol)),
            self.transport.place_quick_order(symbol, action, quantity),
        )
        .await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<CommandAck, CommandError> {
        self.run(
            CommandKind::CancelOrder,
            Some(format!("order:{}", order_id)),
            self.transport.cancel_order(order_id),
        )
        .await
    }

    pub async fn close_position(&self, symbol: &str) -> Result<CommandAck, CommandError> {
        self.run(
            CommandKind::ClosePosition,
            Some(symbol_key(symbol)),
            self.transport.close_position(symbol),
        )
        .await
    }

    pub async fn start_trading(&self) -> Result<CommandAck, CommandError> {
        self.run(CommandKind::StartTrading, None, self.transport.start_trading())
            .await
    }

    pub async fn stop_trading(&self) -> Result<CommandAck, CommandError> {
        self.run(CommandKind::StopTrading, None, self.transport.stop_trading())
            .await
    }

    /// Same lifecycle as every other command; confirmation happens upstream
    pub async fn emergency_stop(&self) -> Result<CommandAck, CommandError> {
        self.run(CommandKind::EmergencyStop, None, self.transport.emergency_stop())
            .await
    }

    async fn run<F>(
        &self,
        kind: CommandKind,
        key: Option<String>,
        call: F,
    ) -> Result<CommandAck, CommandError>
    where
        F: Future<Output = TransportResult<CommandAck>>,
    {
        let _claim = match (&self.in_flight, key) {
            (Some(table), Some(key)) => match table.try_acquire(&key) {
                Ok(claim) => Some(claim),
                Err(request_id) => {
                    return Err(CommandError::InFlight {
                        kind,
                        key,
                        request_id,
                    });
                }
            },
            _ => None,
        };
        let _loading = Loading::enter(&self.loading[kind.index()]);

        debug!("Issuing {}", kind);
        let ack = call.await?;
        if !ack.success {
            return Err(CommandError::Rejected {
                kind,
                message: ack.message,
            });
        }
        if !self.liveness.is_live() {
            debug!("{} resolved after its session ended", kind);
            return Err(CommandError::Stale { kind, ack });
        }

        self.notifier.success(kind, &ack.message);
        if let Err(e) = self.transport.refresh().await {
            warn!("Refresh after {} failed: {}", kind, e);
            self.reporter.report(
                &ErrorNotice::new(format!("Refresh after {} failed: {}", kind, e))
                    .with_code("refresh_failed"),
            );
        }
        Ok(ack)
    }
}

fn symbol_key(symbol: &str) -> String {
    format!("symbol:{}", symbol)
}
