//! Event bus interface for ordered, at-least-once delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::events::EventMessage;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Publish not acknowledged within {0:?}")]
    Timeout(Duration),

    #[error("Encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Bus closed")]
    Closed,
}

/// Broker acknowledgment of a published message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: Uuid,
}

/// Interface for publishing events.
///
/// `publish` returns only once the broker has accepted the message. The
/// message's ordering key ([`EventMessage::ordering_key`]) makes the broker
/// deliver messages of one owner in publish order.
///
/// Implementations:
/// - `ChannelEventBus`: in-process fan-out with ordering keys and redelivery
/// - `MockEventBus`: records messages; can fail or stall publishes
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, message: Arc<EventMessage>) -> Result<PublishReceipt>;
}
