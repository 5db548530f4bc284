//! Subscription registry
//!
//! The single point of contact between consumers and the transport. Many
//! listeners share one underlying connection: the first `subscribe` starts the
//! transport (single-flight), later ones only register. Every inbound event is
//! delivered synchronously, in arrival order, to every registered listener.
//!
//! ```text
//!  Transport ──deliver──► InboundRouter ──┬── connection_status ──► ConnectionMachine ─┐
//!                                         ├── error ──► ErrorReporter ─┐               │
//!                                         └────────────────────────────┴──► FanOut ◄───┘
//!                                                                            │
//!                                                          listener, listener, listener
//! ```

use crate::config::SyncConfig;
use crate::connection::{ConnectionHandle, ConnectionMachine};
use crate::error::SubscribeError;
use crate::reporter::ErrorReporter;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tradedesk_core::SyncEvent;
use tradedesk_ports::{Clock, EventSink, Transport, TransportError};

/// Callback receiving every fanned-out event
pub type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Listener table plus the delivery lock
///
/// Holding `delivery` for the whole of one event's fan-out means no listener
/// can see an event ahead of another. Listeners must not publish from inside
/// their callback.
#[derive(Default)]
pub(crate) struct FanOut {
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    delivery: Mutex<()>,
}

impl FanOut {
    pub(crate) fn add(&self, listener: Listener) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        listeners.push((id, listener));
        id
    }

    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub(crate) fn publish(&self, event: &SyncEvent) {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
        self.deliver(event);
    }

    /// Build an event and fan it out under the delivery lock
    ///
    /// Lets a state change and its announcement happen atomically with respect
    /// to other publishers.
    pub(crate) fn publish_with<F>(&self, build: F) -> Option<SyncEvent>
    where
        F: FnOnce() -> Option<SyncEvent>,
    {
        let _delivery = self.delivery.lock().unwrap_or_else(|e| e.into_inner());
        let event = build()?;
        self.deliver(&event);
        Some(event)
    }

    fn deliver(&self, event: &SyncEvent) {
        // Snapshot so listeners can (un)subscribe re-entrantly
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(event);
        }
    }
}

/// Handle to one registration
///
/// Dropping it does not detach the listener; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    fanout: Weak<FanOut>,
    active: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop delivery to this listener only. Idempotent.
    ///
    /// Returns whether this call removed the registration.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        match self.fanout.upgrade() {
            Some(fanout) => fanout.remove(self.id),
            None => false,
        }
    }
}

/// The transport's `EventSink`: routes each inbound event before fan-out
struct InboundRouter {
    fanout: Arc<FanOut>,
    machine: Arc<ConnectionMachine>,
    reporter: Arc<dyn ErrorReporter>,
}

impl EventSink for InboundRouter {
    fn deliver(&self, event: SyncEvent) {
        match event {
            SyncEvent::ConnectionStatus(state) => {
                // Fanned out by the machine when it applies the transition
                self.machine.observe(state);
            }
            SyncEvent::Error(ref notice) => {
                self.reporter.report(notice);
                self.fanout.publish(&event);
            }
            _ => self.fanout.publish(&event),
        }
    }
}

pub struct SubscriptionRegistry {
    transport: Arc<dyn Transport>,
    fanout: Arc<FanOut>,
    machine: Arc<ConnectionMachine>,
    reporter: Arc<dyn ErrorReporter>,
    started: AtomicBool,
    start_lock: tokio::sync::Mutex<()>,
    stop_epoch: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let fanout = Arc::new(FanOut::default());
        let machine = Arc::new(ConnectionMachine::new(
            Arc::clone(&transport),
            clock,
            Arc::clone(&fanout),
            Arc::clone(&reporter),
            config.refresh_on_reconnect,
        ));

        Self {
            transport,
            fanout,
            machine,
            reporter,
            started: AtomicBool::new(false),
            start_lock: tokio::sync::Mutex::new(()),
            stop_epoch: AtomicU64::new(0),
        }
    }

    /// Register a listener without starting the transport
    pub fn register<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = self.fanout.add(Arc::new(listener));
        debug!("Registered listener {} ({} total)", id, self.fanout.len());
        Subscription {
            id,
            fanout: Arc::downgrade(&self.fanout),
            active: AtomicBool::new(true),
        }
    }

    /// Register a listener and make sure the transport is started
    ///
    /// If `start` fails the listener stays registered and the error carries its
    /// subscription; it receives events once a later start succeeds.
    pub async fn subscribe<F>(&self, listener: F) -> Result<Subscription, SubscribeError>
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let subscription = self.register(listener);
        match self.ensure_started().await {
            Ok(()) => Ok(subscription),
            Err(e) => Err(SubscribeError::new(e, subscription)),
        }
    }

    /// Start the transport unless this active period already did
    ///
    /// A `stop()` that lands while `start` is still in flight wins: the
    /// transport is stopped again and the caller gets
    /// `TransportError::StoppedDuringStart`.
    pub async fn ensure_started(&self) -> Result<(), TransportError> {
        if self.is_started() {
            return Ok(());
        }

        let _guard = self.start_lock.lock().await;
        if self.is_started() {
            return Ok(());
        }

        let epoch = self.stop_epoch.load(Ordering::Acquire);
        let sink: Arc<dyn EventSink> = Arc::new(InboundRouter {
            fanout: Arc::clone(&self.fanout),
            machine: Arc::clone(&self.machine),
            reporter: Arc::clone(&self.reporter),
        });
        self.transport.start(sink).await?;

        self.started.store(true, Ordering::Release);
        if self.stop_epoch.load(Ordering::Acquire) != epoch {
            warn!("Stopped while starting, tearing the transport back down");
            self.started.store(false, Ordering::Release);
            self.transport.stop();
            return Err(TransportError::StoppedDuringStart);
        }
        info!("Transport started ({} listeners)", self.fanout.len());
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Stop the shared transport; the next subscribe starts it again
    ///
    /// Listeners stay registered.
    pub fn stop(&self) {
        self.stop_epoch.fetch_add(1, Ordering::AcqRel);
        if self.started.swap(false, Ordering::AcqRel) {
            info!("Stopping transport");
        }
        self.transport.stop();
    }

    /// Deliver an event to every registered listener
    pub fn publish(&self, event: &SyncEvent) {
        self.fanout.publish(event);
    }

    pub fn listener_count(&self) -> usize {
        self.fanout.len()
    }

    pub fn connection(&self) -> ConnectionHandle {
        ConnectionHandle::new(Arc::clone(&self.machine))
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
