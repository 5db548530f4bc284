//! Entity projector
//!
//! Reconciles each event into one of three keyed collections. Every event
//! carries a complete snapshot of its entity, so an upsert simply replaces
//! whatever the key held before (last-write-wins, no field merging).

use dashmap::DashMap;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tradedesk_core::{EntityKind, Keyed, Order, Position, Quote, SyncEvent};
use tradedesk_ports::Transport;

/// Keyed collection with at most one live entry per key
pub struct Collection<T> {
    entries: DashMap<String, T>,
    loaded: AtomicBool,
    revision: watch::Sender<u64>,
}

impl<T: Keyed + Clone> Collection<T> {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            entries: DashMap::new(),
            loaded: AtomicBool::new(false),
            revision,
        }
    }

    /// Insert if absent, replace if present. Returns the replaced entry.
    pub fn upsert(&self, entity: T) -> Option<T> {
        let previous = self.entries.insert(entity.key().to_string(), entity);
        self.loaded.store(true, Ordering::Release);
        self.revision.send_modify(|revision| *revision += 1);
        previous
    }

    /// Upsert each entity; returns how many were applied
    pub fn hydrate(&self, entities: Vec<T>) -> usize {
        let count = entities.len();
        for entity in entities {
            self.upsert(entity);
        }
        count
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// All entries, ordered by key
    pub fn snapshot(&self) -> Vec<T> {
        let mut entries: Vec<T> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| a.key().cmp(b.key()));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether hydration or an event has populated this collection yet
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub(crate) fn mark_loaded(&self) {
        if !self.loaded.swap(true, Ordering::AcqRel) {
            self.revision.send_modify(|revision| *revision += 1);
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.loaded.store(false, Ordering::Release);
        self.revision.send_modify(|revision| *revision += 1);
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver that wakes whenever the collection changes
    pub fn changed(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl<T: Keyed + Clone> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The three projected collections
#[derive(Default)]
pub struct Projection {
    pub quotes: Arc<Collection<Quote>>,
    pub positions: Arc<Collection<Position>>,
    pub orders: Arc<Collection<Order>>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project one event; connection and error events are not projected
    pub fn apply(&self, event: &SyncEvent) -> Option<EntityKind> {
        match event {
            SyncEvent::MarketData(quote) => {
                self.quotes.upsert(quote.clone());
            }
            SyncEvent::PositionUpdate(position) => {
                self.positions.upsert(position.clone());
            }
            SyncEvent::OrderUpdate(order) => {
                self.orders.upsert(order.clone());
            }
            SyncEvent::ConnectionStatus(_) | SyncEvent::Error(_) => return None,
        }
        event.entity_kind()
    }

    /// Seed every collection from the transport's snapshot getters
    ///
    /// A collection counts as loaded when its snapshot was non-empty, or when
    /// the transport already reports a live connection (an empty snapshot is
    /// then authoritative).
    pub fn hydrate_from(&self, transport: &dyn Transport) {
        let authoritative = transport.connection_status().phase.is_connected();

        let quotes = self.quotes.hydrate(transport.market_data());
        let positions = self.positions.hydrate(transport.positions());
        let orders = self.orders.hydrate(transport.orders());

        if authoritative {
            self.mark_all_loaded();
        }
        debug!(
            "Hydrated {} quotes, {} positions, {} orders",
            quotes, positions, orders
        );
    }

    pub(crate) fn mark_all_loaded(&self) {
        self.quotes.mark_loaded();
        self.positions.mark_loaded();
        self.orders.mark_loaded();
    }

    pub fn clear(&self) {
        self.quotes.clear();
        self.positions.clear();
        self.orders.clear();
    }
}
