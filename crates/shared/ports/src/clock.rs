use chrono::Duration;
use tradedesk_core::Timestamp;

/// Time source for latency and uptime readings
///
/// Production code reads the wall clock; tests drive a manual clock so that
/// uptime and error-rate figures are exact.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Time elapsed since `earlier`, never negative
    ///
    /// A timestamp stamped by a backend whose clock runs ahead reads as zero.
    fn elapsed_since(&self, earlier: Timestamp) -> Duration {
        (self.now() - earlier).max(Duration::zero())
    }

    fn name(&self) -> &str {
        "Clock"
    }
}
