//! Reference-counted subscriptions
//!
//! The plain registry only stops the transport on an explicit `stop()`. This
//! opt-in wrapper counts its own subscriptions and stops the transport when
//! the last one is released.

use crate::registry::{Subscription, SubscriptionRegistry};
use log::info;
use std::sync::{Arc, Mutex};
use tradedesk_core::SyncEvent;
use tradedesk_ports::TransportError;

pub struct CountedRegistry {
    registry: Arc<SubscriptionRegistry>,
    count: Mutex<usize>,
}

impl CountedRegistry {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            count: Mutex::new(0),
        })
    }

    /// Subscribe and take a reference on the transport
    ///
    /// Unlike the plain registry, a failed start releases the registration.
    pub async fn subscribe<F>(
        self: &Arc<Self>,
        listener: F,
    ) -> Result<CountedSubscription, TransportError>
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        *self.count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        let counted = CountedSubscription {
            inner: Some(self.registry.register(listener)),
            owner: Arc::clone(self),
        };

        // Dropping `counted` on failure releases the reference
        self.registry.ensure_started().await?;
        Ok(counted)
    }

    pub fn active(&self) -> usize {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&self, subscription: Subscription) {
        subscription.unsubscribe();
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count = count.saturating_sub(1);
        if *count == 0 {
            info!("Last counted subscription released, stopping transport");
            self.registry.stop();
        }
    }
}

/// Releases its reference when dropped
pub struct CountedSubscription {
    inner: Option<Subscription>,
    owner: Arc<CountedRegistry>,
}

impl CountedSubscription {
    pub fn id(&self) -> Option<u64> {
        self.inner.as_ref().map(Subscription::id)
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(subscription) = self.inner.take() {
            self.owner.release(subscription);
        }
    }
}

impl Drop for CountedSubscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}
