//! In-memory channel-based event bus for standalone mode.
//!
//! Fans every published message out to all named subscriptions. Within a
//! subscription, messages sharing an ordering key are delivered one at a
//! time in publish order; different keys flow independently.
//! Delivery is at-least-once: a message is redelivered until acked,
//! rejected, or out of attempts.

mod subscription;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::BusConfig;
use crate::events::EventMessage;
use crate::interfaces::event_bus::{BusError, EventBus, PublishReceipt, Result};

pub use subscription::{Delivery, Envelope, Subscription};
use subscription::SubscriptionState;

/// Delivery settings for channel subscriptions.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Deliveries of one message before it is dead-lettered.
    pub max_delivery_attempts: u32,
    /// Wait before a nacked message becomes deliverable again.
    pub redelivery_delay: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_delivery_attempts: 5,
            redelivery_delay: Duration::from_millis(250),
        }
    }
}

impl From<&BusConfig> for ChannelConfig {
    fn from(config: &BusConfig) -> Self {
        Self {
            max_delivery_attempts: config.max_delivery_attempts.max(1),
            redelivery_delay: Duration::from_millis(config.redelivery_delay_ms),
        }
    }
}

/// In-memory event bus with named subscriptions and ordering keys.
pub struct ChannelEventBus {
    config: ChannelConfig,
    subscriptions: RwLock<Vec<Arc<SubscriptionState>>>,
    closed: AtomicBool,
}

impl ChannelEventBus {
    pub fn new(config: ChannelConfig) -> Self {
        info!(
            max_delivery_attempts = config.max_delivery_attempts,
            redelivery_delay_ms = config.redelivery_delay.as_millis() as u64,
            "Channel event bus initialized"
        );
        Self {
            config,
            subscriptions: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a named subscription. It receives messages published from
    /// now on.
    pub async fn subscribe(&self, name: impl Into<String>) -> Subscription {
        let name = name.into();
        let state = Arc::new(SubscriptionState::new(name.clone(), self.config.clone()));
        let count = {
            let mut subscriptions = self.subscriptions.write().await;
            subscriptions.push(state.clone());
            subscriptions.len()
        };
        info!(subscription = %name, subscription_count = count, "Subscription registered");
        Subscription::new(state)
    }

    /// Fan an already-encoded payload out to every subscription.
    pub async fn publish_raw(
        &self,
        ordering_key: &str,
        data: Vec<u8>,
    ) -> Result<PublishReceipt> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }

        let envelope = Envelope {
            message_id: Uuid::new_v4(),
            ordering_key: ordering_key.to_string(),
            data,
            attempts: 0,
        };
        let receipt = PublishReceipt {
            message_id: envelope.message_id,
        };

        let subscriptions = self.subscriptions.read().await;
        for subscription in subscriptions.iter() {
            subscription.push(envelope.clone());
        }
        debug!(
            message_id = %receipt.message_id,
            subscribers = subscriptions.len(),
            "Published event to channel"
        );

        Ok(receipt)
    }

    /// Reject further publishes and close every subscription.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for subscription in self.subscriptions.read().await.iter() {
            subscription.close();
        }
        info!("Channel event bus closed");
    }
}

#[async_trait]
impl EventBus for ChannelEventBus {
    #[tracing::instrument(
        name = "bus.publish",
        skip_all,
        fields(operation = %message.operation(), owner = %message.owner())
    )]
    async fn publish(&self, message: Arc<EventMessage>) -> Result<PublishReceipt> {
        self.publish_raw(message.ordering_key(), message.encode()?)
            .await
    }
}
