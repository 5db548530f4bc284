//! Sync layer configuration

use crate::backoff::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of latency samples kept by the performance monitor
    pub latency_window: usize,
    /// Resync projections when a dropped connection recovers
    pub refresh_on_reconnect: bool,
    /// Reject a command against an order or symbol that already has one pending
    pub serialize_per_resource: bool,
    /// Connect as part of creating a session
    pub auto_connect: bool,
    /// Run a backoff supervisor that reconnects after `failed`
    pub auto_reconnect: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            latency_window: 100,
            refresh_on_reconnect: true,
            serialize_per_resource: false,
            auto_connect: true,
            auto_reconnect: false,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.latency_window == 0 {
            return Err(ConfigError::Invalid {
                field: "latency_window",
                reason: "must be positive".to_string(),
            });
        }
        if self.reconnect.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                field: "reconnect.multiplier",
                reason: format!("{} is below 1.0", self.reconnect.multiplier),
            });
        }
        if self.reconnect.max_delay_ms < self.reconnect.initial_delay_ms {
            return Err(ConfigError::Invalid {
                field: "reconnect.max_delay_ms",
                reason: "smaller than initial_delay_ms".to_string(),
            });
        }
        Ok(())
    }
}

/// Load sync configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<SyncConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

pub fn load_config_from_str(json: &str) -> Result<SyncConfig, ConfigError> {
    let config: SyncConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the embedded default configuration
pub fn load_default_config() -> Result<SyncConfig, ConfigError> {
    load_config_from_str(include_str!("sync_config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_matches_defaults() {
        assert_eq!(load_default_config().unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = load_config_from_str(r#"{ "serialize_per_resource": true }"#).unwrap();
        assert!(config.serialize_per_resource);
        assert_eq!(config.latency_window, 100);
        assert!(config.refresh_on_reconnect);
    }

    #[test]
    fn test_zero_window_rejected() {
        let err = load_config_from_str(r#"{ "latency_window": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "latency_window",
                ..
            }
        ));
    }
}
