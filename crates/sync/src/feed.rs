//! Consumer-facing entity subscriptions

use crate::projector::Collection;
use std::sync::Arc;
use tokio::sync::watch;
use tradedesk_core::Keyed;
use tradedesk_ports::{Transport, TransportError};

/// Live view of one projected collection
///
/// Reads always reflect the latest projected snapshot; consumers never write
/// through a feed.
pub struct EntityFeed<T> {
    collection: Arc<Collection<T>>,
    transport: Arc<dyn Transport>,
}

impl<T> Clone for EntityFeed<T> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Keyed + Clone> EntityFeed<T> {
    pub(crate) fn new(collection: Arc<Collection<T>>, transport: Arc<dyn Transport>) -> Self {
        Self {
            collection,
            transport,
        }
    }

    /// Current entries, ordered by key
    pub fn data(&self) -> Vec<T> {
        self.collection.snapshot()
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.collection.get(key)
    }

    /// True until hydration or the first event for this collection
    pub fn is_loading(&self) -> bool {
        !self.collection.is_loaded()
    }

    /// Ask the transport for a resync pass
    ///
    /// Updated entities arrive as ordinary events afterwards.
    pub async fn refresh(&self) -> Result<(), TransportError> {
        self.transport.refresh().await?;
        self.collection.mark_loaded();
        Ok(())
    }

    pub fn changed(&self) -> watch::Receiver<u64> {
        self.collection.changed()
    }
}
