use serde::{Deserialize, Serialize};

use crate::values::Timestamp;

/// Lifecycle phase of the transport connection
///
/// ```text
/// disconnected ──connect──► connecting ──ok──► connected ──disconnect──► disconnected
///                               │                 │
///                             error             drop
///                               ▼                 ▼
///  connecting ◄──reconnect── failed ◄──give up── reconnecting ──ok──► connected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionPhase {
    pub const ALL: [ConnectionPhase; 5] = [
        ConnectionPhase::Disconnected,
        ConnectionPhase::Connecting,
        ConnectionPhase::Connected,
        ConnectionPhase::Reconnecting,
        ConnectionPhase::Failed,
    ];

    /// Whether `self -> next` is an edge of the lifecycle graph
    pub fn can_transition_to(&self, next: ConnectionPhase) -> bool {
        use ConnectionPhase::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Failed)
                | (Connected, Disconnected)
                | (Connected, Reconnecting)
                | (Reconnecting, Connected)
                | (Reconnecting, Failed)
                | (Failed, Connecting)
        )
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionPhase::Connected)
    }

    /// A connection attempt or transport retry is in flight
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ConnectionPhase::Connecting | ConnectionPhase::Reconnecting
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Reconnecting => "reconnecting",
            ConnectionPhase::Failed => "failed",
        }
    }

    /// Compact encoding for atomic storage
    pub fn as_u8(&self) -> u8 {
        match self {
            ConnectionPhase::Disconnected => 0,
            ConnectionPhase::Connecting => 1,
            ConnectionPhase::Connected => 2,
            ConnectionPhase::Reconnecting => 3,
            ConnectionPhase::Failed => 4,
        }
    }

    /// Inverse of `as_u8`; unknown values decode as `Disconnected`
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionPhase::Connecting,
            2 => ConnectionPhase::Connected,
            3 => ConnectionPhase::Reconnecting,
            4 => ConnectionPhase::Failed,
            _ => ConnectionPhase::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current connection phase plus when it last entered `connected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    #[serde(rename = "status")]
    pub phase: ConnectionPhase,
    pub last_connected_at: Option<Timestamp>,
}

impl ConnectionState {
    pub fn new(phase: ConnectionPhase, last_connected_at: Option<Timestamp>) -> Self {
        Self {
            phase,
            last_connected_at,
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }
}
