//! Dashboard run - drives one authenticated session end to end
//!
//! Spawns the simulated backend behind a channel transport, logs in, and logs
//! a dashboard snapshot (quotes, positions, orders, connection, metrics) on a
//! fixed interval. After the first snapshot it places the configured sample
//! order through the command facade. At the end it logs out and shuts the
//! backend down.

use crate::config::RunConfig;
use crate::error::Result;
use log::{info, warn};
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tradedesk_clock::SystemClock;
use tradedesk_core::ConnectionPhase;
use tradedesk_gateway::spawn_simulated;
use tradedesk_ports::Clock;
use tradedesk_sync::{PerformanceMetrics, SyncContext};

/// What the dashboard showed when the run ended
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub quotes: usize,
    pub positions: usize,
    pub orders: usize,
    pub snapshots: u32,
    pub final_phase: ConnectionPhase,
    pub sample_order_id: Option<String>,
    pub metrics: PerformanceMetrics,
}

pub struct DashboardRun {
    config: RunConfig,
}

impl DashboardRun {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<RunSummary> {
        self.config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let (transport, backend) = spawn_simulated(&self.config.gateway, Arc::clone(&clock))?;
        let ctx = SyncContext::new(Arc::new(transport), clock, self.config.sync.clone());

        ctx.login();
        let quotes = ctx.quotes().await?;
        let positions = ctx.positions().await?;
        let orders = ctx.orders().await?;
        let connection = ctx.connection().await?;
        let commands = ctx.commands().await?;

        let deadline = Instant::now() + self.config.duration();
        let mut interval = tokio::time::interval(self.config.snapshot_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick fires immediately
        interval.tick().await;

        let mut snapshots = 0;
        let mut sample_order_id = None;
        let mut sample_pending = self.config.sample_order.clone();

        while Instant::now() < deadline {
            tokio::select! {
                _ = interval.tick() => {}
                _ = tokio::time::sleep_until(deadline) => break,
            }
            snapshots += 1;

            let status = connection.connection_status();
            let metrics = ctx.metrics().await?;
            info!(
                "[{}] {} | quotes={} positions={} orders={} | latency={:.2}ms errors/s={:.3}",
                snapshots,
                status.phase,
                quotes.data().len(),
                positions.data().len(),
                orders.data().len(),
                metrics.average_latency_ms,
                metrics.error_rate,
            );
            for quote in quotes.data() {
                info!(
                    "  {} {} (bid {} / ask {}) {}%",
                    quote.symbol, quote.last_price, quote.bid, quote.ask, quote.change_percent
                );
            }
            for position in positions.data().iter().filter(|p| !p.is_closed()) {
                info!(
                    "  {} {} @ {} pnl {}",
                    position.symbol, position.quantity, position.average_price, position.pnl
                );
            }

            if let Some(order) = sample_pending.take() {
                match commands
                    .place_quick_order(&order.symbol, order.action, order.quantity)
                    .await
                {
                    Ok(ack) => {
                        info!("Sample order accepted: {}", ack.message);
                        sample_order_id = ack.order_id;
                    }
                    Err(e) => warn!("Sample order failed: {}", e),
                }
            }
        }

        let summary = RunSummary {
            quotes: quotes.data().len(),
            positions: positions.data().len(),
            orders: orders.data().len(),
            snapshots,
            final_phase: connection.connection_status().phase,
            sample_order_id,
            metrics: ctx.metrics().await?,
        };

        ctx.logout().await;
        backend.shutdown().await;
        info!("Run finished after {} snapshots", summary.snapshots);
        Ok(summary)
    }
}
