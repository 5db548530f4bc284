//! Connection state machine
//!
//! Tracks the transport's lifecycle phase and mediates connect, disconnect and
//! reconnect requests. Each transition is applied by compare-and-set and
//! announced as a `connection_status` event through the same fan-out as every
//! other event, so the sequence consumers observe is always a walk over the
//! legal transition graph.

use crate::error::ConnectionError;
use crate::registry::FanOut;
use crate::reporter::ErrorReporter;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tradedesk_core::{ConnectionPhase, ConnectionState, ErrorNotice, SyncEvent, Timestamp};
use tradedesk_ports::{Clock, Transport, TransportResult};

pub struct ConnectionMachine {
    phase: AtomicU8,
    last_connected_at: RwLock<Option<Timestamp>>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    fanout: Arc<FanOut>,
    reporter: Arc<dyn ErrorReporter>,
    refresh_on_reconnect: bool,
    changes: watch::Sender<ConnectionState>,
}

impl ConnectionMachine {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        fanout: Arc<FanOut>,
        reporter: Arc<dyn ErrorReporter>,
        refresh_on_reconnect: bool,
    ) -> Self {
        let (changes, _) = watch::channel(ConnectionState::disconnected());
        Self {
            phase: AtomicU8::new(ConnectionPhase::Disconnected.as_u8()),
            last_connected_at: RwLock::new(None),
            transport,
            clock,
            fanout,
            reporter,
            refresh_on_reconnect,
            changes,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        ConnectionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::new(self.phase(), self.last_connected())
    }

    fn last_connected(&self) -> Option<Timestamp> {
        *self
            .last_connected_at
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn subscribe_changes(&self) -> watch::Receiver<ConnectionState> {
        self.changes.subscribe()
    }

    /// `disconnected -> connecting -> connected | failed`
    ///
    /// A no-op while an attempt is already in flight or connected. From
    /// `failed` only `reconnect()` may start a new attempt.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        match self.phase() {
            ConnectionPhase::Disconnected => {}
            ConnectionPhase::Failed => {
                return Err(ConnectionError::IllegalTransition {
                    from: ConnectionPhase::Failed,
                    to: ConnectionPhase::Connecting,
                });
            }
            other => {
                debug!("connect() ignored while {}", other);
                return Ok(());
            }
        }

        if !self.advance(
            ConnectionPhase::Disconnected,
            ConnectionPhase::Connecting,
            None,
        ) {
            // Another caller moved first
            return match self.phase() {
                ConnectionPhase::Failed => Err(ConnectionError::IllegalTransition {
                    from: ConnectionPhase::Failed,
                    to: ConnectionPhase::Connecting,
                }),
                _ => Ok(()),
            };
        }

        let result = self.transport.connect().await;
        self.settle(result)
    }

    /// `connected -> disconnected` once the transport has disconnected
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        match self.phase() {
            ConnectionPhase::Disconnected => return Ok(()),
            ConnectionPhase::Connected => {}
            other => {
                return Err(ConnectionError::IllegalTransition {
                    from: other,
                    to: ConnectionPhase::Disconnected,
                });
            }
        }

        self.transport.disconnect().await?;
        if !self.advance(
            ConnectionPhase::Connected,
            ConnectionPhase::Disconnected,
            None,
        ) {
            debug!("Disconnect settled while {}", self.phase());
        }
        Ok(())
    }

    /// Start a fresh attempt from `failed`, `disconnected` or `connected`
    ///
    /// From `connected` the machine first passes through `disconnected`. While
    /// `connecting` or `reconnecting` this is a no-op.
    pub async fn reconnect(&self) -> Result<(), ConnectionError> {
        if self.phase() == ConnectionPhase::Connected {
            self.advance(
                ConnectionPhase::Connected,
                ConnectionPhase::Disconnected,
                None,
            );
        }

        let from = self.phase();
        if from.is_pending() || from.is_connected() {
            debug!("reconnect() ignored while {}", from);
            return Ok(());
        }
        if !self.advance(from, ConnectionPhase::Connecting, None) {
            debug!("reconnect() lost the race, now {}", self.phase());
            return Ok(());
        }

        let result = self.transport.reconnect().await;
        self.settle(result)
    }

    /// Apply a phase reported by the transport, if legal from the current one
    ///
    /// Only `connect()` and `reconnect()` enter `connecting`; a reported
    /// `connecting` is never applied. Returns whether the transition was applied.
    pub fn observe(&self, reported: ConnectionState) -> bool {
        let current = self.phase();
        let next = reported.phase;

        if current == next {
            return false;
        }
        if next == ConnectionPhase::Connecting || !current.can_transition_to(next) {
            debug!("Dropping reported {} while {}", next, current);
            return false;
        }

        let applied = self.advance(current, next, reported.last_connected_at);
        if applied
            && current == ConnectionPhase::Reconnecting
            && next == ConnectionPhase::Connected
            && self.refresh_on_reconnect
        {
            self.spawn_refresh();
        }
        applied
    }

    /// Resolve a `connecting` attempt with the transport's answer
    fn settle(&self, result: TransportResult<()>) -> Result<(), ConnectionError> {
        let (target, outcome) = match result {
            Ok(()) => (ConnectionPhase::Connected, Ok(())),
            Err(e) => {
                warn!("Connection attempt failed: {}", e);
                (ConnectionPhase::Failed, Err(ConnectionError::from(e)))
            }
        };

        // The transport may already have reported the outcome
        if !self.advance(ConnectionPhase::Connecting, target, None) && self.phase() != target {
            debug!(
                "Attempt resolved to {} but phase is already {}",
                target,
                self.phase()
            );
        }
        outcome
    }

    /// Compare-and-set `from -> to`, then announce it. Both happen under the
    /// fan-out's delivery lock.
    fn advance(
        &self,
        from: ConnectionPhase,
        to: ConnectionPhase,
        reported_at: Option<Timestamp>,
    ) -> bool {
        debug_assert!(from.can_transition_to(to), "{from} -> {to}");

        self.fanout
            .publish_with(|| {
                self.phase
                    .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
                    .ok()?;

                let mut last = self
                    .last_connected_at
                    .write()
                    .unwrap_or_else(|e| e.into_inner());
                if to == ConnectionPhase::Connected {
                    *last = Some(reported_at.unwrap_or_else(|| self.clock.now()));
                }
                let state = ConnectionState::new(to, *last);
                drop(last);

                info!("Connection {} -> {}", from, to);
                self.changes.send_replace(state);
                Some(SyncEvent::ConnectionStatus(state))
            })
            .is_some()
    }

    fn spawn_refresh(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime to refresh after reconnect");
            return;
        };

        info!("Connection recovered, refreshing projections");
        let transport = Arc::clone(&self.transport);
        let reporter = Arc::clone(&self.reporter);
        runtime.spawn(async move {
            if let Err(e) = transport.refresh().await {
                reporter.report(
                    &ErrorNotice::new(format!("Refresh after reconnect failed: {}", e))
                        .with_code("refresh_failed"),
                );
            }
        });
    }
}

/// Consumer-facing view of the connection
#[derive(Clone)]
pub struct ConnectionHandle {
    machine: Arc<ConnectionMachine>,
}

impl ConnectionHandle {
    pub(crate) fn new(machine: Arc<ConnectionMachine>) -> Self {
        Self { machine }
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.machine.state()
    }

    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.machine.connect().await
    }

    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.machine.disconnect().await
    }

    pub async fn reconnect(&self) -> Result<(), ConnectionError> {
        self.machine.reconnect().await
    }

    /// Receiver that wakes on every applied transition
    pub fn changed(&self) -> watch::Receiver<ConnectionState> {
        self.machine.subscribe_changes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::LogReporter;
    use crate::testing::RecordingTransport;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;
    use tradedesk_clock::ManualClock;
    use tradedesk_ports::TransportError;

    use ConnectionPhase::*;

    struct Fixture {
        transport: Arc<RecordingTransport>,
        machine: Arc<ConnectionMachine>,
        phases: Arc<Mutex<Vec<ConnectionPhase>>>,
        clock: Arc<ManualClock>,
    }

    fn fixture(refresh_on_reconnect: bool) -> Fixture {
        let transport = RecordingTransport::new();
        let clock = ManualClock::new(Some(Utc.with_ymd_and_hms(2024, 1, 2, 9, 30, 0).unwrap()));
        let fanout = Arc::new(FanOut::default());
        let phases = Arc::new(Mutex::new(Vec::new()));

        let captured = phases.clone();
        fanout.add(Arc::new(move |event: &SyncEvent| {
            if let SyncEvent::ConnectionStatus(state) = event {
                captured.lock().unwrap().push(state.phase);
            }
        }));

        let machine = Arc::new(ConnectionMachine::new(
            transport.clone(),
            clock.clone(),
            fanout,
            Arc::new(LogReporter),
            refresh_on_reconnect,
        ));
        Fixture {
            transport,
            machine,
            phases,
            clock,
        }
    }

    fn assert_legal_walk(phases: &[ConnectionPhase]) {
        let mut current = Disconnected;
        for next in phases {
            assert!(
                current.can_transition_to(*next),
                "illegal {current} -> {next} in {phases:?}"
            );
            current = *next;
        }
    }

    #[tokio::test]
    async fn test_connect_success() {
        let f = fixture(false);
        f.machine.connect().await.unwrap();

        assert_eq!(f.machine.phase(), Connected);
        assert_eq!(*f.phases.lock().unwrap(), vec![Connecting, Connected]);
        assert_eq!(f.machine.state().last_connected_at, Some(f.clock.now()));
        assert_eq!(f.transport.connects(), 1);

        // Already connected
        f.machine.connect().await.unwrap();
        assert_eq!(f.transport.connects(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_then_reconnect() {
        let f = fixture(false);
        f.transport
            .fail_connect(TransportError::Connection("refused".to_string()));

        let err = f.machine.connect().await.unwrap_err();
        assert_eq!(
            err,
            ConnectionError::Transport(TransportError::Connection("refused".to_string()))
        );
        assert_eq!(f.machine.phase(), Failed);

        // connect() may not leave failed
        assert!(matches!(
            f.machine.connect().await,
            Err(ConnectionError::IllegalTransition { from: Failed, .. })
        ));

        f.transport.clear_connect_failure();
        f.machine.reconnect().await.unwrap();
        assert_eq!(f.machine.phase(), Connected);
        assert_eq!(
            *f.phases.lock().unwrap(),
            vec![Connecting, Failed, Connecting, Connected]
        );
    }

    #[tokio::test]
    async fn test_disconnect() {
        let f = fixture(false);
        f.machine.disconnect().await.unwrap();
        assert_eq!(f.transport.disconnects(), 0);

        f.machine.connect().await.unwrap();
        f.machine.disconnect().await.unwrap();
        assert_eq!(f.machine.phase(), Disconnected);
        assert_eq!(f.transport.disconnects(), 1);
        assert_legal_walk(&f.phases.lock().unwrap());
    }

    #[tokio::test]
    async fn test_reconnect_from_connected_passes_through_disconnected() {
        let f = fixture(false);
        f.machine.connect().await.unwrap();
        f.machine.reconnect().await.unwrap();

        assert_eq!(
            *f.phases.lock().unwrap(),
            vec![Connecting, Connected, Disconnected, Connecting, Connected]
        );
        assert_eq!(f.transport.reconnects(), 1);
    }

    #[test]
    fn test_observe_rejects_illegal_reports() {
        let f = fixture(false);
        let report = |phase| ConnectionState::new(phase, None);

        assert!(!f.machine.observe(report(Connected)));
        assert!(!f.machine.observe(report(Connecting)));
        assert!(f.machine.advance(Disconnected, Connecting, None));
        assert!(!f.machine.observe(report(Connecting)));
        assert!(f.machine.observe(report(Failed)));
        // failed -> connected must pass through connecting
        assert!(!f.machine.observe(report(Connected)));
        assert!(!f.machine.observe(report(Reconnecting)));

        assert_eq!(*f.phases.lock().unwrap(), vec![Connecting, Failed]);
    }

    #[tokio::test]
    async fn test_reported_connecting_after_failure_is_dropped() {
        let f = fixture(false);
        f.transport
            .fail_connect(TransportError::Connection("refused".to_string()));
        assert!(f.machine.connect().await.is_err());
        assert_eq!(f.machine.phase(), Failed);

        assert!(!f.machine.observe(ConnectionState::new(Connecting, None)));
        assert!(!f.machine.observe(ConnectionState::new(Connected, None)));
        assert_eq!(f.machine.phase(), Failed);
        assert_eq!(f.transport.connects(), 1);
        assert_eq!(f.transport.reconnects(), 0);
        assert_eq!(*f.phases.lock().unwrap(), vec![Connecting, Failed]);
    }

    #[tokio::test]
    async fn test_reported_connecting_after_disconnect_is_dropped() {
        let f = fixture(false);
        f.machine.connect().await.unwrap();
        f.machine.disconnect().await.unwrap();

        assert!(!f.machine.observe(ConnectionState::new(Connecting, None)));
        assert_eq!(f.machine.phase(), Disconnected);
        assert_eq!(
            *f.phases.lock().unwrap(),
            vec![Connecting, Connected, Disconnected]
        );
    }

    #[test]
    fn test_observe_keeps_reported_timestamp() {
        let f = fixture(false);
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();

        f.machine.advance(Disconnected, Connecting, None);
        f.machine.observe(ConnectionState::new(Connected, Some(at)));
        assert_eq!(f.machine.state().last_connected_at, Some(at));
    }

    #[tokio::test]
    async fn test_recovered_drop_refreshes_once() {
        let f = fixture(true);
        f.machine.connect().await.unwrap();

        assert!(f.machine.observe(ConnectionState::new(Reconnecting, None)));
        assert!(f.machine.observe(ConnectionState::new(Connected, None)));
        tokio::task::yield_now().await;

        assert_eq!(f.transport.refreshes(), 1);
        assert_legal_walk(&f.phases.lock().unwrap());
    }

    #[tokio::test]
    async fn test_no_refresh_when_disabled() {
        let f = fixture(false);
        f.machine.connect().await.unwrap();
        f.machine.observe(ConnectionState::new(Reconnecting, None));
        f.machine.observe(ConnectionState::new(Connected, None));
        tokio::task::yield_now().await;

        assert_eq!(f.transport.refreshes(), 0);
    }

    #[tokio::test]
    async fn test_racing_reports_stay_legal() {
        let f = fixture(false);
        let machine = f.machine.clone();

        // Transport reports the outcome before connect() resolves
        let reporter = tokio::spawn(async move {
            machine.observe(ConnectionState::new(Connecting, None));
            machine.observe(ConnectionState::new(Connected, None));
        });
        f.machine.connect().await.unwrap();
        reporter.await.unwrap();

        assert_eq!(f.machine.phase(), Connected);
        assert_legal_walk(&f.phases.lock().unwrap());
    }

    #[tokio::test]
    async fn test_handle_watch_wakes_on_transition() {
        let f = fixture(false);
        let handle = ConnectionHandle::new(f.machine.clone());
        let mut changes = handle.changed();

        handle.connect().await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().phase, Connected);
        assert_eq!(handle.connection_status().phase, Connected);
    }
}
