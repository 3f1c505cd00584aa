//! Subscription-to-projector pipeline.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{Delivery, Subscription};
use crate::config::PoolConfig;
use crate::dispatch::{DispatchPool, JobHandler, PoolStats};
use crate::events::EventMessage;
use crate::interfaces::{Projector, ProjectorError};

/// Settles one delivery by the projector's outcome.
struct ProjectionHandler {
    projector: Arc<dyn Projector>,
}

#[async_trait]
impl JobHandler<Delivery> for ProjectionHandler {
    type Error = ProjectorError;

    async fn handle(&self, delivery: Delivery) -> Result<(), ProjectorError> {
        let event = match EventMessage::decode(delivery.data()) {
            Ok(event) => event,
            Err(e) => {
                delivery.reject(&e.to_string());
                return Err(e.into());
            }
        };

        match self.projector.project(&event).await {
            Ok(()) => {
                debug!(
                    projector = self.projector.name(),
                    operation_id = %event.operation_id(),
                    "Event projected"
                );
                delivery.ack();
                Ok(())
            }
            Err(e) if e.is_permanent() => {
                delivery.reject(&e.to_string());
                Err(e)
            }
            Err(e) => {
                delivery.nack();
                Err(e)
            }
        }
    }
}

/// Feeds one subscription through a dispatch pool into a projector.
pub struct ProjectionConsumer {
    name: String,
    subscription: Subscription,
    pool: Arc<DispatchPool<Delivery>>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl ProjectionConsumer {
    pub fn start(
        subscription: Subscription,
        projector: Arc<dyn Projector>,
        config: &PoolConfig,
    ) -> Self {
        let name = projector.name().to_string();
        let handler = Arc::new(ProjectionHandler { projector });
        let pool = Arc::new(DispatchPool::start(name.clone(), config, handler));
        let receiver = tokio::spawn(receive(subscription.clone(), pool.clone()));
        info!(consumer = %name, subscription = subscription.name(), "Projection consumer started");

        Self {
            name,
            subscription,
            pool,
            receiver: Mutex::new(Some(receiver)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn stats(&self) -> &Arc<PoolStats> {
        self.pool.stats()
    }

    /// Stop receiving, finish every delivery already handed to the pool,
    /// then stop the pool. Unsettled messages stay on the subscription.
    pub async fn shutdown(&self) {
        self.subscription.close();
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(receiver) = receiver {
            if let Err(e) = receiver.await {
                warn!(consumer = %self.name, error = %e, "Receive loop failed");
            }
        }
        self.pool.drain().await;
        info!(consumer = %self.name, "Projection consumer stopped");
    }
}

async fn receive(subscription: Subscription, pool: Arc<DispatchPool<Delivery>>) {
    while let Some(delivery) = subscription.recv().await {
        if let Err(e) = pool.submit(delivery).await {
            // The rejected delivery is dropped and goes back on the queue.
            warn!(subscription = subscription.name(), error = %e, "Dispatch pool refused delivery");
            break;
        }
    }
    debug!(subscription = subscription.name(), "Receive loop exited");
}
