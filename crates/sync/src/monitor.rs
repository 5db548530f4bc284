//! Performance monitor
//!
//! Samples the event stream from an ordinary listener, so it never gates
//! delivery to anyone else.

use crate::registry::{Subscription, SubscriptionRegistry};
use chrono::Duration;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tradedesk_core::{ConnectionPhase, SyncEvent, Timestamp};
use tradedesk_ports::Clock;

/// Fixed-capacity ring buffer of latency samples with a running sum
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    sum: f64,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            sum: 0.0,
            capacity,
        }
    }

    /// Add a sample, evicting the oldest when full
    pub fn push(&mut self, latency_ms: f64) {
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(latency_ms);
        self.sum += latency_ms;
    }

    /// Mean of the current contents (0 when empty)
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }

    pub fn samples(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    pub average_latency_ms: f64,
    /// Errors per second since the last transition into `connected`
    pub error_rate: f64,
    pub error_count: u64,
    /// Time connected, as of the last sampled event while connected
    pub uptime: Option<Duration>,
    pub samples: usize,
}

#[derive(Debug)]
struct MonitorState {
    window: LatencyWindow,
    error_count: u64,
    connected_since: Option<Timestamp>,
    phase: ConnectionPhase,
    uptime: Option<Duration>,
}

pub struct PerformanceMonitor {
    clock: Arc<dyn Clock>,
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    pub fn new(clock: Arc<dyn Clock>, window: usize) -> Self {
        Self {
            clock,
            state: Mutex::new(MonitorState {
                window: LatencyWindow::new(window),
                error_count: 0,
                connected_since: None,
                phase: ConnectionPhase::Disconnected,
                uptime: None,
            }),
        }
    }

    /// Register the sampling listener on `registry`
    pub fn attach(self: &Arc<Self>, registry: &SubscriptionRegistry) -> Subscription {
        let monitor = Arc::clone(self);
        registry.register(move |event| monitor.record(event))
    }

    /// Sample one event
    pub fn record(&self, event: &SyncEvent) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            SyncEvent::MarketData(quote) => {
                let elapsed = self.clock.elapsed_since(quote.timestamp);
                let micros = elapsed.num_microseconds().unwrap_or(i64::MAX);
                state.window.push(micros as f64 / 1_000.0);
            }
            SyncEvent::Error(_) => state.error_count += 1,
            SyncEvent::ConnectionStatus(connection) => {
                if connection.phase == ConnectionPhase::Connected
                    && state.phase != ConnectionPhase::Connected
                {
                    state.error_count = 0;
                    state.connected_since = Some(connection.last_connected_at.unwrap_or(now));
                }
                if connection.phase != ConnectionPhase::Connected {
                    state.uptime = None;
                }
                state.phase = connection.phase;
            }
            SyncEvent::PositionUpdate(_) | SyncEvent::OrderUpdate(_) => {}
        }

        if state.phase == ConnectionPhase::Connected {
            state.uptime = state.connected_since.map(|since| now - since);
        }
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        let now = self.clock.now();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let elapsed_secs = state
            .connected_since
            .map(|since| (now - since).num_milliseconds() as f64 / 1_000.0)
            .unwrap_or(0.0);

        PerformanceMetrics {
            average_latency_ms: state.window.mean(),
            // At least one second, so a read right after connect stays finite
            error_rate: state.error_count as f64 / elapsed_secs.max(1.0),
            error_count: state.error_count,
            uptime: state.uptime,
            samples: state.window.len(),
        }
    }

    pub fn latency_samples(&self) -> Vec<f64> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .window
            .samples()
    }

    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.window.clear();
        state.error_count = 0;
        state.connected_since = None;
        state.phase = ConnectionPhase::Disconnected;
        state.uptime = None;
    }
}
