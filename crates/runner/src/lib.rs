//! Tradedesk Runner
//!
//! Wires the whole stack together for a terminal dashboard:
//!
//! ```text
//!   SimulatedBackend ◄──► ChannelTransport ◄──► SyncContext ──► snapshot log
//! ```

pub mod config;
pub mod dashboard;
pub mod error;

pub use config::{RunConfig, SampleOrder};
pub use dashboard::{DashboardRun, RunSummary};
pub use error::{Error, Result};
