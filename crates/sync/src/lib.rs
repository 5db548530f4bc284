//! Tradedesk Sync
//!
//! Real-time state synchronization for the trading dashboard. One shared
//! transport fans events out to many consumers, each collection is kept as a
//! keyed projection, and trading commands force a resync once they succeed.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!  Transport ─events──►│  SubscriptionRegistry (single-flight start)  │
//!      ▲               │    ├─► ConnectionMachine (phase, CAS)        │
//!      │               │    └─► FanOut ─┬─► Projection ─► EntityFeed  │──► consumers
//!      │               │                ├─► PerformanceMonitor        │
//!      │               │                └─► raw listeners             │
//!      │               └──────────────────────────────────────────────┘
//!      └──── commands, refresh ◄── CommandFacade ◄──────────────────────── consumers
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tradedesk_sync::{SyncConfig, SyncContext};
//!
//! let ctx = SyncContext::new(transport, clock, SyncConfig::default());
//! ctx.login();
//!
//! let quotes = ctx.quotes().await?;
//! let commands = ctx.commands().await?;
//! commands.cancel_order("o1").await?;
//! println!("{} quotes", quotes.data().len());
//! ```

pub mod backoff;
pub mod commands;
pub mod config;
pub mod connection;
pub mod counted;
pub mod error;
pub mod feed;
pub mod liveness;
pub mod monitor;
pub mod projector;
pub mod registry;
pub mod reporter;
pub mod session;

#[cfg(test)]
mod testing;

pub use backoff::{ReconnectPolicy, spawn_reconnect_supervisor};
pub use commands::{CommandFacade, CommandKind, InFlight, InFlightState};
pub use config::{ConfigError, SyncConfig, load_config, load_config_from_str, load_default_config};
pub use connection::{ConnectionHandle, ConnectionMachine};
pub use counted::{CountedRegistry, CountedSubscription};
pub use error::{CommandError, ConnectionError, Result, SubscribeError, SyncError};
pub use feed::EntityFeed;
pub use liveness::{Generation, LivenessToken};
pub use monitor::{LatencyWindow, PerformanceMetrics, PerformanceMonitor};
pub use projector::{Collection, Projection};
pub use registry::{Listener, Subscription, SubscriptionRegistry};
pub use reporter::{ErrorReporter, LogNotifier, LogReporter, Notifier};
pub use session::{Session, SyncContext};
