//! Tradedesk Clock Infrastructure
//!
//! Time sources for latency and uptime measurement:
//!
//! - [`SystemClock`]: wall-clock time for production
//! - [`ManualClock`]: frozen time that moves only on `advance`/`set`, for
//!   deterministic tests
//!
//! ## Usage
//!
//! ```ignore
//! use tradedesk_clock::{ManualClock, Clock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(None);
//! let start = clock.now();
//! clock.advance(Duration::seconds(30));
//! assert_eq!(clock.now() - start, Duration::seconds(30));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use tradedesk_ports::Clock;
