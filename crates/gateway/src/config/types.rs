use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Capacity of the event broadcast and request channels
    pub channel_capacity: usize,
    /// How long a lifecycle or command request may wait for its reply
    pub request_timeout_ms: u64,
    pub simulator: SimulatorConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            request_timeout_ms: 5_000,
            simulator: SimulatorConfig::default(),
        }
    }
}

/// A symbol the simulated backend quotes, with its starting price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    pub price: Decimal,
}

/// Simulated backend behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub symbols: Vec<SymbolConfig>,
    /// Interval between quote ticks
    pub tick_interval_ms: u64,
    /// Delay between a quick order being accepted and filled
    pub fill_latency_ms: u64,
    /// Largest per-tick price move, in basis points
    pub max_step_bps: i64,
    /// Quoted bid/ask spread
    pub spread: Decimal,
    /// Seed for reproducible price paths (entropy if absent)
    pub seed: Option<u64>,
    /// Number of initial connect attempts that fail
    pub connect_failures: u32,
    /// Simulate a dropped connection every N ticks
    pub drop_every_ticks: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            symbols: vec![
                SymbolConfig {
                    symbol: "AAPL".to_string(),
                    price: dec!(190.00),
                },
                SymbolConfig {
                    symbol: "MSFT".to_string(),
                    price: dec!(410.00),
                },
            ],
            tick_interval_ms: 250,
            fill_latency_ms: 500,
            max_step_bps: 10,
            spread: dec!(0.02),
            seed: None,
            connect_failures: 0,
            drop_every_ticks: None,
        }
    }
}
