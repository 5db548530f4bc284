//! Tradedesk Ports
//!
//! Port definitions (traits) for the tradedesk synchronization layer.
//! These define the boundaries between the synchronization logic and the
//! transport / time infrastructure.

mod clock;
mod error;
mod transport;

pub use clock::Clock;
pub use error::{TransportError, TransportResult};
pub use transport::{CommandAck, EventSink, Transport};
