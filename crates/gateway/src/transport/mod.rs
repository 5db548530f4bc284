//! Transport layer
//!
//! Message-passing primitives over tokio channels, and [`ChannelTransport`],
//! the `Transport` port implementation built on them.
//! The `Publisher`/`Subscriber`/`Requester` traits allow plugging in other
//! wire technologies (sockets, long-poll) behind the same transport.

pub mod channel;
pub mod channel_transport;

pub use channel_transport::ChannelTransport;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tradedesk_ports::TransportError;

/// Publisher - sends messages to every current subscriber
#[async_trait]
pub trait Publisher<M>: Send + Sync
where
    M: Serialize + Send + Sync,
{
    /// Publish a message
    async fn publish(&self, msg: &M) -> Result<(), TransportError>;
}

/// Subscriber - receives published messages in order
#[async_trait]
pub trait Subscriber<M>: Send
where
    M: DeserializeOwned + Send,
{
    /// Wait for the next message
    async fn next(&mut self) -> Result<M, TransportError>;

    /// Try to receive without blocking (returns None if no message available)
    fn try_next(&mut self) -> Result<Option<M>, TransportError>;
}

/// Request/Reply pattern for lifecycle operations and commands
#[async_trait]
pub trait Requester<Req, Res>: Send + Sync
where
    Req: Serialize + Send + Sync,
    Res: DeserializeOwned + Send,
{
    /// Send a request and wait for a response
    async fn request(&self, req: &Req) -> Result<Res, TransportError>;
}
