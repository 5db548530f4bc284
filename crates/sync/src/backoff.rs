//! Reconnect backoff supervisor
//!
//! The connection machine never retries on its own. This supervisor is an
//! opt-in policy layered outside it: it watches the phase and calls
//! `reconnect()` after `failed`, waiting an exponentially growing delay
//! between attempts.

use crate::connection::ConnectionHandle;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tradedesk_core::ConnectionPhase;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            max_attempts: Some(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the zero-based `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

/// Watch `handle` and reconnect with backoff whenever the phase is `failed`
///
/// The attempt counter resets once the connection reaches `connected`. The
/// task runs until aborted.
pub fn spawn_reconnect_supervisor(
    handle: ConnectionHandle,
    policy: ReconnectPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut changes = handle.changed();
        let mut attempt: u32 = 0;

        loop {
            let phase = changes.borrow_and_update().phase;
            if phase == ConnectionPhase::Connected {
                attempt = 0;
            }

            if phase == ConnectionPhase::Failed && policy.allows(attempt) {
                let delay = policy.delay_for(attempt);
                attempt += 1;
                info!("Reconnect attempt {} in {:?}", attempt, delay);
                tokio::time::sleep(delay).await;

                if handle.connection_status().phase == ConnectionPhase::Failed {
                    if let Err(e) = handle.reconnect().await {
                        warn!("Reconnect attempt {} failed: {}", attempt, e);
                    }
                }
                continue;
            }

            if phase == ConnectionPhase::Failed {
                warn!("Giving up after {} reconnect attempts", attempt);
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
}
