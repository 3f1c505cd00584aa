//! Mock event bus implementation for testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::events::EventMessage;
use crate::interfaces::event_bus::{BusError, EventBus, PublishReceipt, Result};

/// Mock event bus recording published messages.
#[derive(Default)]
pub struct MockEventBus {
    published: RwLock<Vec<EventMessage>>,
    fail_on_publish: RwLock<bool>,
    /// Fail only the next N publishes.
    fail_next: RwLock<usize>,
    publish_delay: RwLock<Option<Duration>>,
    attempts: RwLock<usize>,
}

impl MockEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    /// Fail the next `count` publishes, then succeed.
    pub async fn fail_next(&self, count: usize) {
        *self.fail_next.write().await = count;
    }

    /// Stall every publish before acknowledging.
    pub async fn set_publish_delay(&self, delay: Option<Duration>) {
        *self.publish_delay.write().await = delay;
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    pub async fn published(&self) -> Vec<EventMessage> {
        self.published.read().await.clone()
    }

    /// Publish calls made, failed ones included.
    pub async fn attempt_count(&self) -> usize {
        *self.attempts.read().await
    }
}

#[async_trait]
impl EventBus for MockEventBus {
    async fn publish(&self, message: Arc<EventMessage>) -> Result<PublishReceipt> {
        *self.attempts.write().await += 1;

        let delay = *self.publish_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_on_publish.read().await {
            return Err(BusError::Connection("Mock publish failure".to_string()));
        }
        {
            let mut fail_next = self.fail_next.write().await;
            if *fail_next > 0 {
                *fail_next -= 1;
                return Err(BusError::Publish("Mock transient failure".to_string()));
            }
        }

        self.published.write().await.push((*message).clone());
        Ok(PublishReceipt {
            message_id: Uuid::new_v4(),
        })
    }
}
