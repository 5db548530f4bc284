//! Session scope
//!
//! [`SyncContext`] is the process-wide owner of the synchronization layer.
//! Everything it hands out belongs to the authenticated session: the first
//! use after `login()` builds the registry, projection and monitor, starts the
//! transport once, connects, then hydrates from the transport's snapshot;
//! `logout()` tears it all down.

use crate::backoff::spawn_reconnect_supervisor;
use crate::commands::CommandFacade;
use crate::config::SyncConfig;
use crate::connection::ConnectionHandle;
use crate::error::{Result, SyncError};
use crate::feed::EntityFeed;
use crate::liveness::{Generation, LivenessToken};
use crate::monitor::{PerformanceMetrics, PerformanceMonitor};
use crate::projector::Projection;
use crate::registry::{Subscription, SubscriptionRegistry};
use crate::reporter::{ErrorReporter, LogNotifier, LogReporter, Notifier};
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tradedesk_core::{ErrorNotice, Order, Position, Quote, SyncEvent};
use tradedesk_ports::{Clock, Transport};

/// Everything scoped to one authenticated session
pub struct Session {
    registry: Arc<SubscriptionRegistry>,
    projection: Arc<Projection>,
    monitor: Arc<PerformanceMonitor>,
    commands: Arc<CommandFacade>,
    listeners: Vec<Subscription>,
    connect_pending: AtomicBool,
    hydrate_pending: AtomicBool,
    supervisor: Option<JoinHandle<()>>,
    generation: u64,
}

impl Session {
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn projection(&self) -> &Arc<Projection> {
        &self.projection
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn teardown(&self) {
        if let Some(supervisor) = &self.supervisor {
            supervisor.abort();
        }
        self.registry.stop();
        for listener in &self.listeners {
            listener.unsubscribe();
        }
        self.projection.clear();
        self.monitor.reset();
    }
}

pub struct SyncContext {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    reporter: Arc<dyn ErrorReporter>,
    notifier: Arc<dyn Notifier>,
    generation: Arc<Generation>,
    authenticated: AtomicBool,
    session: Mutex<Option<Arc<Session>>>,
}

impl SyncContext {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, config: SyncConfig) -> Self {
        Self {
            transport,
            clock,
            config,
            reporter: Arc::new(LogReporter),
            notifier: Arc::new(LogNotifier),
            generation: Generation::new(),
            authenticated: AtomicBool::new(false),
            session: Mutex::new(None),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn login(&self) {
        if !self.authenticated.swap(true, Ordering::AcqRel) {
            info!("Authenticated, session will start on first use");
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Stop the transport, clear every collection and invalidate the session
    pub async fn logout(&self) {
        self.authenticated.store(false, Ordering::Release);
        let session = self.session.lock().await.take();
        if let Some(session) = session {
            session.teardown();
            let generation = self.generation.bump();
            info!("Logged out, session generation now {}", generation);
        }
    }

    /// The live session, created on first use after login
    pub async fn session(&self) -> Result<Arc<Session>> {
        if !self.is_authenticated() {
            return Err(SyncError::Unauthenticated);
        }

        let session = {
            let mut slot = self.session.lock().await;
            match slot.as_ref() {
                Some(session) => Arc::clone(session),
                None => {
                    let session = Arc::new(self.build_session());
                    *slot = Some(Arc::clone(&session));
                    session
                }
            }
        };

        if let Err(e) = session.registry.ensure_started().await {
            if !self.is_authenticated() {
                return Err(SyncError::Unauthenticated);
            }
            return Err(e.into());
        }

        // Held through connect so a concurrent logout tears down afterwards
        let slot = self.session.lock().await;
        let current = slot
            .as_ref()
            .is_some_and(|live| Arc::ptr_eq(live, &session));
        if !current || !self.is_authenticated() {
            return Err(SyncError::Unauthenticated);
        }

        if self.config.auto_connect && session.connect_pending.swap(false, Ordering::AcqRel) {
            if let Err(e) = session.registry.connection().connect().await {
                // Visible through the connection phase; not fatal to the session
                warn!("Initial connect failed: {}", e);
                self.reporter
                    .report(&ErrorNotice::new(e.to_string()).with_code("connect_failed"));
            }
        }
        if session.hydrate_pending.swap(false, Ordering::AcqRel) {
            session.projection.hydrate_from(self.transport.as_ref());
        }
        drop(slot);
        Ok(session)
    }

    fn build_session(&self) -> Session {
        let generation = self.generation.current();
        info!("Creating session (generation {})", generation);

        let registry = Arc::new(SubscriptionRegistry::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.clock),
            &self.config,
            Arc::clone(&self.reporter),
        ));

        let projection = Arc::new(Projection::new());

        let projector = Arc::clone(&projection);
        let mut listeners = vec![registry.register(move |event: &SyncEvent| {
            projector.apply(event);
        })];

        let monitor = Arc::new(PerformanceMonitor::new(
            Arc::clone(&self.clock),
            self.config.latency_window,
        ));
        listeners.push(monitor.attach(&registry));

        let mut commands = CommandFacade::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.notifier),
            Arc::clone(&self.reporter),
            LivenessToken::capture(&self.generation),
        );
        if self.config.serialize_per_resource {
            commands = commands.serialized_per_resource();
        }

        let supervisor = self
            .config
            .auto_reconnect
            .then(|| spawn_reconnect_supervisor(registry.connection(), self.config.reconnect.clone()));

        Session {
            registry,
            projection,
            monitor,
            commands: Arc::new(commands),
            listeners,
            connect_pending: AtomicBool::new(true),
            hydrate_pending: AtomicBool::new(true),
            supervisor,
            generation,
        }
    }

    pub async fn quotes(&self) -> Result<EntityFeed<Quote>> {
        let session = self.session().await?;
        Ok(EntityFeed::new(
            Arc::clone(&session.projection.quotes),
            Arc::clone(&self.transport),
        ))
    }

    pub async fn positions(&self) -> Result<EntityFeed<Position>> {
        let session = self.session().await?;
        Ok(EntityFeed::new(
            Arc::clone(&session.projection.positions),
            Arc::clone(&self.transport),
        ))
    }

    pub async fn orders(&self) -> Result<EntityFeed<Order>> {
        let session = self.session().await?;
        Ok(EntityFeed::new(
            Arc::clone(&session.projection.orders),
            Arc::clone(&self.transport),
        ))
    }

    pub async fn connection(&self) -> Result<ConnectionHandle> {
        Ok(self.session().await?.registry.connection())
    }

    pub async fn commands(&self) -> Result<Arc<CommandFacade>> {
        Ok(Arc::clone(&self.session().await?.commands))
    }

    pub async fn metrics(&self) -> Result<PerformanceMetrics> {
        Ok(self.session().await?.monitor.metrics())
    }

    /// Register an additional raw listener on the session's fan-out
    pub async fn subscribe<F>(&self, listener: F) -> Result<Subscription>
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        Ok(self.session().await?.registry.register(listener))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandKind;
    use crate::error::CommandError;
    use crate::testing::{RecordingTransport, quote};
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tradedesk_clock::ManualClock;
    use tradedesk_core::ConnectionPhase;
    use tradedesk_ports::TransportError;

    fn context(transport: &Arc<RecordingTransport>, config: SyncConfig) -> SyncContext {
        SyncContext::new(transport.clone(), ManualClock::new(None), config)
    }

    #[tokio::test]
    async fn test_unauthenticated_access_fails() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport, SyncConfig::default());

        assert!(matches!(ctx.quotes().await, Err(SyncError::Unauthenticated)));
        assert!(matches!(ctx.commands().await, Err(SyncError::Unauthenticated)));
        assert_eq!(transport.starts(), 0);
    }

    #[tokio::test]
    async fn test_lazy_session_starts_and_connects_once() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport, SyncConfig::default());
        ctx.login();

        let quotes = ctx.quotes().await.unwrap();
        let _orders = ctx.orders().await.unwrap();
        let connection = ctx.connection().await.unwrap();

        assert_eq!(transport.starts(), 1);
        assert_eq!(transport.connects(), 1);
        assert_eq!(connection.connection_status().phase, ConnectionPhase::Connected);

        transport.emit(SyncEvent::MarketData(quote("AAPL", dec!(190))));
        assert_eq!(quotes.data().len(), 1);
        assert!(!quotes.is_loading());
    }

    #[tokio::test]
    async fn test_session_hydrates_on_first_use() {
        let transport = RecordingTransport::new();
        transport.set_quotes(vec![quote("MSFT", dec!(410))]);
        let ctx = context(
            &transport,
            SyncConfig {
                auto_connect: false,
                ..Default::default()
            },
        );
        ctx.login();

        let quotes = ctx.quotes().await.unwrap();
        assert_eq!(quotes.data()[0].symbol, "MSFT");
        assert_eq!(transport.connects(), 0);
    }

    #[tokio::test]
    async fn test_logout_tears_down_and_login_rebuilds() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport, SyncConfig::default());
        ctx.login();

        let quotes = ctx.quotes().await.unwrap();
        transport.emit(SyncEvent::MarketData(quote("AAPL", dec!(190))));
        let first = ctx.session().await.unwrap().generation();

        ctx.logout().await;
        assert_eq!(transport.stops(), 1);
        assert!(quotes.data().is_empty());
        assert!(matches!(ctx.metrics().await, Err(SyncError::Unauthenticated)));

        ctx.login();
        let second = ctx.session().await.unwrap().generation();
        assert_eq!(second, first + 1);
        assert_eq!(transport.starts(), 2);
        assert_eq!(transport.connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_during_first_use_leaves_transport_stopped() {
        let transport = RecordingTransport::new();
        transport.delay_start(Duration::from_millis(100));
        let ctx = Arc::new(context(&transport, SyncConfig::default()));
        ctx.login();

        let first_use = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.quotes().await.map(|_| ()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        ctx.logout().await;

        assert!(matches!(
            first_use.await.unwrap(),
            Err(SyncError::Unauthenticated)
        ));
        assert_eq!(transport.connects(), 0);
        assert!(!transport.has_sink());

        // The next session gets a working transport of its own
        ctx.login();
        let quotes = ctx.quotes().await.unwrap();
        assert!(transport.has_sink());
        assert_eq!(transport.connects(), 1);
        transport.emit(SyncEvent::MarketData(quote("AAPL", dec!(190))));
        assert_eq!(quotes.data().len(), 1);
    }

    #[tokio::test]
    async fn test_command_after_logout_is_stale() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport, SyncConfig::default());
        ctx.login();
        let commands = ctx.commands().await.unwrap();

        ctx.logout().await;
        let err = commands.cancel_order("o1").await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Stale {
                kind: CommandKind::CancelOrder,
                ..
            }
        ));
        assert_eq!(transport.refreshes(), 0);
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_and_retries() {
        let transport = RecordingTransport::new();
        transport.fail_start(TransportError::Connection("offline".to_string()));
        let ctx = context(&transport, SyncConfig::default());
        ctx.login();

        assert!(matches!(
            ctx.positions().await,
            Err(SyncError::Transport(TransportError::Connection(_)))
        ));
        assert_eq!(transport.connects(), 0);

        transport.clear_start_failure();
        let positions = ctx.positions().await.unwrap();
        assert_eq!(transport.starts(), 2);
        assert_eq!(transport.connects(), 1);
        assert!(positions.data().is_empty());
    }

    #[tokio::test]
    async fn test_metrics_sample_the_session_stream() {
        let transport = RecordingTransport::new();
        let ctx = context(&transport, SyncConfig::default());
        ctx.login();
        ctx.session().await.unwrap();

        transport.emit(SyncEvent::error("one"));
        transport.emit(SyncEvent::MarketData(quote("AAPL", dec!(190))));

        let metrics = ctx.metrics().await.unwrap();
        assert_eq!(metrics.error_count, 1);
        assert_eq!(metrics.samples, 1);
    }
}
