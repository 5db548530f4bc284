//! Tokio channel primitives for single-process mode
//!
//! Broadcast channels give pub/sub semantics (every subscriber sees every
//! message, in order); mpsc + oneshot give request/reply.
//! No serialization overhead - messages are passed directly.

use crate::transport::{Publisher, Requester, Subscriber};
use async_trait::async_trait;
use log::warn;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{broadcast, mpsc, oneshot};
use tradedesk_ports::TransportError;

/// Channel-based publisher using broadcast
#[derive(Clone)]
pub struct ChannelPublisher<M> {
    tx: broadcast::Sender<M>,
}

impl<M: Clone> ChannelPublisher<M> {
    /// Create a publisher with no subscribers yet
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Create a publisher/subscriber pair with given capacity
    pub fn pair(capacity: usize) -> (Self, ChannelSubscriber<M>) {
        let publisher = Self::new(capacity);
        let subscriber = publisher.subscribe();
        (publisher, subscriber)
    }

    /// Get another subscriber for this publisher
    ///
    /// The subscriber only sees messages published after this call.
    pub fn subscribe(&self) -> ChannelSubscriber<M> {
        ChannelSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish without awaiting; returns false when nobody is listening
    pub fn send(&self, msg: M) -> bool {
        self.tx.send(msg).is_ok()
    }
}

#[async_trait]
impl<M> Publisher<M> for ChannelPublisher<M>
where
    M: Serialize + Clone + Send + Sync + 'static,
{
    async fn publish(&self, msg: &M) -> Result<(), TransportError> {
        self.tx
            .send(msg.clone())
            .map_err(|_| TransportError::ChannelClosed)?;
        Ok(())
    }
}

/// Channel-based subscriber using broadcast receiver
pub struct ChannelSubscriber<M> {
    rx: broadcast::Receiver<M>,
}

#[async_trait]
impl<M> Subscriber<M> for ChannelSubscriber<M>
where
    M: DeserializeOwned + Clone + Send + 'static,
{
    async fn next(&mut self) -> Result<M, TransportError> {
        loop {
            match self.rx.recv().await {
                Ok(msg) => return Ok(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Skipped messages are recovered by the next refresh
                    warn!("Subscriber lagged, skipped {} messages", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(TransportError::ChannelClosed);
                }
            }
        }
    }

    fn try_next(&mut self) -> Result<Option<M>, TransportError> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Lagged(_)) => {
                // Return None on lag, caller can retry
                Ok(None)
            }
            Err(broadcast::error::TryRecvError::Closed) => Err(TransportError::ChannelClosed),
        }
    }
}

/// Request message wrapper for channel-based request/reply
struct ChannelRequest<Req, Res> {
    request: Req,
    reply_tx: oneshot::Sender<Res>,
}

/// Channel-based requester for request/reply pattern
pub struct ChannelRequester<Req, Res> {
    tx: mpsc::Sender<ChannelRequest<Req, Res>>,
}

impl<Req, Res> Clone for ChannelRequester<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<Req, Res> ChannelRequester<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Create a requester/responder pair
    pub fn pair(capacity: usize) -> (Self, ChannelResponder<Req, Res>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, ChannelResponder { rx })
    }
}

#[async_trait]
impl<Req, Res> Requester<Req, Res> for ChannelRequester<Req, Res>
where
    Req: Serialize + Clone + Send + Sync + 'static,
    Res: DeserializeOwned + Send + 'static,
{
    async fn request(&self, req: &Req) -> Result<Res, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ChannelRequest {
            request: req.clone(),
            reply_tx,
        };

        self.tx
            .send(request)
            .await
            .map_err(|_| TransportError::ChannelClosed)?;

        reply_rx.await.map_err(|_| TransportError::ChannelClosed)
    }
}

/// Channel-based responder (server side of request/reply)
pub struct ChannelResponder<Req, Res> {
    rx: mpsc::Receiver<ChannelRequest<Req, Res>>,
}

impl<Req, Res> ChannelResponder<Req, Res> {
    /// Receive the next request
    pub async fn next(&mut self) -> Option<(Req, oneshot::Sender<Res>)> {
        self.rx.recv().await.map(|req| (req.request, req.reply_tx))
    }
}
