//! Sync layer errors

use crate::commands::CommandKind;
use crate::config::ConfigError;
use crate::registry::Subscription;
use thiserror::Error;
use tradedesk_core::ConnectionPhase;
use tradedesk_ports::{CommandAck, TransportError};

/// Failure of a connection lifecycle request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Illegal connection transition: {from} -> {to}")]
    IllegalTransition {
        from: ConnectionPhase,
        to: ConnectionPhase,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure of a one-shot command, returned to the caller that issued it
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// The transport call itself failed; displays the original message
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered but refused the command
    #[error("{message}")]
    Rejected { kind: CommandKind, message: String },

    #[error("{kind} already pending for {key} (request {request_id})")]
    InFlight {
        kind: CommandKind,
        key: String,
        request_id: u64,
    },

    /// Resolved after the session that issued it was torn down
    #[error("{kind} resolved after its session ended")]
    Stale { kind: CommandKind, ack: CommandAck },
}

/// `start` failed while subscribing
///
/// The listener stays registered; recover the handle with
/// [`SubscribeError::into_subscription`].
#[derive(Error, Debug)]
#[error("Failed to start transport: {source}")]
pub struct SubscribeError {
    #[source]
    source: TransportError,
    subscription: Subscription,
}

impl SubscribeError {
    pub(crate) fn new(source: TransportError, subscription: Subscription) -> Self {
        Self {
            source,
            subscription,
        }
    }

    pub fn transport_error(&self) -> &TransportError {
        &self.source
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn into_subscription(self) -> Subscription {
        self.subscription
    }

    pub fn into_parts(self) -> (TransportError, Subscription) {
        (self.source, self.subscription)
    }
}

/// Session-level errors
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Subscribe(#[from] SubscribeError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
