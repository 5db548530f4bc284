use std::path::Path;
use thiserror::Error;

use super::types::GatewayConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("No symbols configured for the simulator")]
    NoSymbols,
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Load gateway configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GatewayConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<GatewayConfig, ConfigError> {
    let default_config = include_str!("gateway_config.json");
    load_config_from_str(default_config)
}

impl GatewayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulator.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "channel_capacity",
                reason: "must be positive".to_string(),
            });
        }
        if self.simulator.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "simulator.tick_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if let Some(bad) = self
            .simulator
            .symbols
            .iter()
            .find(|s| s.price.is_sign_negative() || s.price.is_zero())
        {
            return Err(ConfigError::Invalid {
                field: "simulator.symbols",
                reason: format!("{} has non-positive price {}", bad.symbol, bad.price),
            });
        }
        Ok(())
    }

    /// Get a configured symbol
    pub fn symbol(&self, symbol: &str) -> Option<&super::types::SymbolConfig> {
        self.simulator.symbols.iter().find(|s| s.symbol == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_load_default_config() {
        let config = load_default_config().unwrap();
        assert!(!config.simulator.symbols.is_empty());
        assert_eq!(config.symbol("AAPL").map(|s| s.price), Some(dec!(190.00)));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = load_config_from_str(r#"{ "request_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.request_timeout_ms, 250);
        assert_eq!(config.channel_capacity, 1024);
        assert_eq!(config.simulator.tick_interval_ms, 250);
    }

    #[test]
    fn test_empty_symbols_rejected() {
        let err = load_config_from_str(r#"{ "simulator": { "symbols": [] } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::NoSymbols));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let json = r#"{ "simulator": { "symbols": [{ "symbol": "X", "price": "0" }] } }"#;
        let err = load_config_from_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
