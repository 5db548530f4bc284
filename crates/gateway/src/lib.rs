//! Tradedesk Gateway
//!
//! Transport layer for the tradedesk sync engine. Provides:
//! - [`ChannelTransport`], the `Transport` port over tokio channels
//! - Request/reply message types for lifecycle operations and commands
//! - A simulated backend producing quotes, fills and connection drops
//!
//! ## Architecture
//!
//! ```text
//!   Simulated backend (or a real broker adapter)
//!         │ events            ▲ requests
//!    ┌────▼───────────────────┴────┐
//!    │      ChannelTransport       │  broadcast feed + mpsc/oneshot
//!    └────┬────────────────────────┘
//!         │ EventSink::deliver
//!    ┌────▼────┐
//!    │  Sync   │
//!    └─────────┘
//! ```
//!
//! The `Publisher`/`Subscriber`/`Requester` traits allow plugging in other
//! wire technologies behind the same transport.

pub mod adapters;
pub mod config;
pub mod error;
pub mod messages;
pub mod transport;

pub use adapters::{BackendHandle, SimulatedBackend, spawn_simulated};
pub use config::{GatewayConfig, SimulatorConfig, SymbolConfig};
pub use error::{GatewayError, TransportError};
pub use messages::{GatewayReply, GatewayRequest};
pub use transport::{
    ChannelTransport, Publisher, Requester, Subscriber,
    channel::{ChannelPublisher, ChannelRequester, ChannelResponder, ChannelSubscriber},
};
