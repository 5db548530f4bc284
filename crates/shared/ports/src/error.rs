use thiserror::Error;

/// Failures reported by a transport implementation
///
/// Display strings are the original messages so callers can surface them as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport not started")]
    NotStarted,

    /// `stop` was called while `start` was still in flight
    #[error("Transport stopped while starting")]
    StoppedDuringStart,

    /// A one-shot command failed at the backend or in transit
    #[error("{0}")]
    Command(String),

    #[error("Refresh failed: {0}")]
    Refresh(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Timeout waiting for response")]
    Timeout,
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
