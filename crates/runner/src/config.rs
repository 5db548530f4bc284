//! Runner configuration
//!
//! One JSON file carries the gateway and sync sections plus the run's own
//! settings. Every field has a default, so `{}` is a valid file.

use crate::error::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tradedesk_core::TradeType;
use tradedesk_gateway::GatewayConfig;
use tradedesk_sync::SyncConfig;

/// Quick order placed once the first snapshot has been logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleOrder {
    pub symbol: String,
    pub action: TradeType,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub gateway: GatewayConfig,
    pub sync: SyncConfig,
    /// Total run time
    pub duration_ms: u64,
    /// How often the dashboard snapshot is logged
    pub snapshot_interval_ms: u64,
    pub sample_order: Option<SampleOrder>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            sync: SyncConfig::default(),
            duration_ms: 5_000,
            snapshot_interval_ms: 1_000,
            sample_order: Some(SampleOrder {
                symbol: "AAPL".to_string(),
                action: TradeType::Buy,
                quantity: dec!(10),
            }),
        }
    }
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: RunConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.gateway
            .validate()
            .map_err(|e| Error::Invalid(e.to_string()))?;
        self.sync
            .validate()
            .map_err(|e| Error::Invalid(e.to_string()))?;
        if self.snapshot_interval_ms == 0 {
            return Err(Error::Invalid(
                "snapshot_interval_ms must be positive".to_string(),
            ));
        }
        if let Some(order) = &self.sample_order {
            if self.gateway.symbol(&order.symbol).is_none() {
                return Err(Error::Invalid(format!(
                    "sample order symbol {} is not simulated",
                    order.symbol
                )));
            }
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }
}
