//! Simulated trading backend
//!
//! Wires a [`SimulatedBackend`] to a [`ChannelTransport`] so the sync layer
//! can run end to end without a live broker.

mod backend;
mod market;

pub use backend::SimulatedBackend;
pub use market::PriceWalk;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::transport::ChannelTransport;
use crate::transport::channel::{ChannelPublisher, ChannelRequester};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tradedesk_ports::Clock;

/// Handle to a running backend task
pub struct BackendHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl BackendHandle {
    /// Ask the backend to stop and wait for it
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("Simulated backend task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawn a simulated backend and the transport that talks to it
///
/// Must be called from within a tokio runtime.
pub fn spawn_simulated(
    config: &GatewayConfig,
    clock: Arc<dyn Clock>,
) -> Result<(ChannelTransport, BackendHandle), GatewayError> {
    config.validate()?;

    let feed = ChannelPublisher::new(config.channel_capacity);
    let (requester, responder) = ChannelRequester::pair(config.channel_capacity);
    let transport = ChannelTransport::new(
        feed.clone(),
        requester,
        Duration::from_millis(config.request_timeout_ms),
    );

    let backend = SimulatedBackend::new(config.simulator.clone(), feed, clock);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(backend.run(responder, shutdown_rx));

    info!(
        "Spawned simulated backend with {} symbols",
        config.simulator.symbols.len()
    );

    Ok((
        transport,
        BackendHandle {
            shutdown: Some(shutdown_tx),
            task,
        },
    ))
}
