//! Runner errors

use thiserror::Error;
use tradedesk_gateway::GatewayError;
use tradedesk_sync::SyncError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Invalid run configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, Error>;
