//! Mutation coordinator: write, publish, compensate.
//!
//! Every mutation runs the same saga:
//!
//! ```text
//! WRITING -> WRITTEN -> PUBLISHING -> PUBLISHED
//!                                  \-> COMPENSATING -> COMPENSATED
//! ```
//!
//! Once the write has committed, publish, compensation and the best-effort
//! follow-up writes run on a spawned task. Dropping the caller's future
//! detaches from that task without cancelling it, so a disconnecting client
//! can never leave a committed write unpublished, uncompensated or missing
//! its counter update.

mod mutations;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::config::BusConfig;
use crate::error::{Error, Result};
use crate::events::{event_timestamp, EventMessage, UserDeleteEvent};
use crate::interfaces::{ApplicationStore, BusError, CacheVersions, EventBus, PublishReceipt};
use crate::model::{CounterDelta, Owner};
use crate::utils::clock::Clock;
use crate::utils::retry::{is_retryable_publish, publish_backoff};

pub use mutations::{
    AddApplication, Committed, Compensation, DeleteApplication, EditApplication, EditStatus,
    Mutation, RevertHistorical, RevertLatest,
};

/// Saga state, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    Writing,
    Written,
    Publishing,
    Published,
    Compensating,
    Compensated,
}

impl SagaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Writing => "WRITING",
            SagaState::Written => "WRITTEN",
            SagaState::Publishing => "PUBLISHING",
            SagaState::Published => "PUBLISHED",
            SagaState::Compensating => "COMPENSATING",
            SagaState::Compensated => "COMPENSATED",
        }
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publish settings for the saga.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    /// Bound on the whole publish, retries included.
    pub timeout: Duration,
    pub retries: usize,
}

impl From<&BusConfig> for PublishPolicy {
    fn from(config: &BusConfig) -> Self {
        Self {
            timeout: config.publish_timeout(),
            retries: config.publish_retries,
        }
    }
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self::from(&BusConfig::default())
    }
}

/// Owned handles for the detached publish step.
#[derive(Clone)]
struct Publisher {
    store: Arc<dyn ApplicationStore>,
    bus: Arc<dyn EventBus>,
    cache: Arc<dyn CacheVersions>,
    policy: PublishPolicy,
}

/// Best-effort writes owed once the event is published.
#[derive(Debug)]
struct FollowUp {
    counters: Vec<CounterDelta>,
    bump_cache: bool,
}

impl Publisher {
    /// Publish with bounded retries inside the publish timeout.
    async fn publish(&self, message: Arc<EventMessage>) -> std::result::Result<PublishReceipt, BusError> {
        let attempt = || {
            let bus = self.bus.clone();
            let message = message.clone();
            async move { bus.publish(message).await }
        };
        let retried = attempt
            .retry(publish_backoff(self.policy.retries))
            .when(is_retryable_publish)
            .notify(|e: &BusError, delay: Duration| {
                warn!(error = %e, delay_ms = delay.as_millis() as u64, "Publish failed, retrying");
            });
        match tokio::time::timeout(self.policy.timeout, retried).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout(self.policy.timeout)),
        }
    }

    /// PUBLISHING, then PUBLISHED or COMPENSATING -> COMPENSATED.
    async fn publish_or_compensate(
        self,
        message: Arc<EventMessage>,
        compensation: Compensation,
        follow_up: FollowUp,
    ) -> Result<()> {
        debug!(state = %SagaState::Publishing, operation_id = %message.operation_id());
        let publish_err = match self.publish(message.clone()).await {
            Ok(receipt) => {
                info!(
                    state = %SagaState::Published,
                    message_id = %receipt.message_id,
                    operation_id = %message.operation_id(),
                    "Event published"
                );
                self.after_publish(message.owner(), follow_up).await;
                return Ok(());
            }
            Err(e) => e,
        };

        warn!(
            state = %SagaState::Compensating,
            error = %publish_err,
            compensation = ?compensation,
            "Publish failed, compensating"
        );
        match compensation.run(self.store.as_ref()).await {
            Ok(()) => {
                info!(state = %SagaState::Compensated, "Write rolled back");
                Err(Error::Publish(publish_err))
            }
            Err(compensation_err) => {
                error!(
                    publish_error = %publish_err,
                    compensation_error = %compensation_err,
                    compensation = ?compensation,
                    "Compensation failed, stores inconsistent until reconciled"
                );
                Err(Error::Compensation {
                    publish: publish_err,
                    compensation: compensation_err,
                })
            }
        }
    }

    /// Best-effort follow-up writes. Failures are logged, never returned:
    /// the mutation is already committed and published.
    async fn after_publish(&self, owner: &Owner, follow_up: FollowUp) {
        let FollowUp {
            counters,
            bump_cache,
        } = follow_up;
        if !counters.is_empty() {
            if let Err(e) = self.store.apply_counters(owner, &counters).await {
                warn!(error = %e, ?counters, "Counter update failed");
            }
        }
        if bump_cache {
            match self.cache.bump(owner).await {
                Ok(version) => debug!(version, "Cache version bumped"),
                Err(e) => warn!(error = %e, "Cache version bump failed"),
            }
        }
    }
}

/// Runs mutations through the write-publish-compensate saga.
///
/// All handles are long-lived and shared; build one coordinator at startup.
pub struct MutationCoordinator {
    store: Arc<dyn ApplicationStore>,
    bus: Arc<dyn EventBus>,
    cache: Arc<dyn CacheVersions>,
    clock: Arc<dyn Clock>,
    policy: PublishPolicy,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        bus: Arc<dyn EventBus>,
        cache: Arc<dyn CacheVersions>,
        clock: Arc<dyn Clock>,
        policy: PublishPolicy,
    ) -> Self {
        Self {
            store,
            bus,
            cache,
            clock,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn ApplicationStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn publisher(&self) -> Publisher {
        Publisher {
            store: self.store.clone(),
            bus: self.bus.clone(),
            cache: self.cache.clone(),
            policy: self.policy.clone(),
        }
    }

    /// Run one mutation through the saga.
    ///
    /// Success means both the write and the publish succeeded. Any error
    /// after the write means the write was undone, except for
    /// [`Error::Compensation`].
    #[tracing::instrument(
        name = "coordinator.perform",
        skip_all,
        fields(owner = %mutation.owner(), operation = %mutation.operation())
    )]
    pub async fn perform<M: Mutation>(&self, mutation: M) -> Result<M::Output> {
        let timestamp = event_timestamp(self.clock.now());

        debug!(state = %SagaState::Writing);
        let committed = mutation.apply(self.store.as_ref(), timestamp).await?;
        debug!(state = %SagaState::Written);

        let Some(event) = committed.event else {
            info!("Write changed nothing, skipping publish");
            return Ok(committed.output);
        };

        let follow_up = FollowUp {
            counters: committed.counters,
            bump_cache: committed.bump_cache,
        };
        let task = self
            .publisher()
            .publish_or_compensate(Arc::new(event), committed.compensation, follow_up)
            .in_current_span();
        tokio::spawn(task)
            .await
            .map_err(|e| Error::Internal(format!("publish task failed: {e}")))??;

        Ok(committed.output)
    }

    /// Delete every application of an owner.
    ///
    /// Not compensable, so the event is published first and the bulk delete
    /// runs only once the bus has accepted it. Returns the number of
    /// applications removed.
    #[tracing::instrument(name = "coordinator.delete_user", skip_all, fields(owner = %owner))]
    pub async fn delete_user(&self, owner: &Owner) -> Result<usize> {
        let message = Arc::new(EventMessage::UserDelete(UserDeleteEvent {
            operation_id: Uuid::new_v4(),
            owner: owner.clone(),
        }));
        let publisher = self.publisher();
        let owner_key = owner.clone();

        let task = async move {
            debug!(state = %SagaState::Publishing);
            let receipt = publisher.publish(message).await.map_err(Error::Publish)?;
            info!(
                state = %SagaState::Published,
                message_id = %receipt.message_id,
                "User delete published"
            );
            let removed = publisher.store.remove_owner(&owner_key).await.map_err(|e| {
                error!(error = %e, "Bulk delete failed after publish, retry required");
                Error::from(e)
            })?;
            info!(removed, "Owner applications removed");
            publisher
                .after_publish(
                    &owner_key,
                    FollowUp {
                        counters: Vec::new(),
                        bump_cache: true,
                    },
                )
                .await;
            Ok::<usize, Error>(removed)
        }
        .in_current_span();

        let removed = tokio::spawn(task)
            .await
            .map_err(|e| Error::Internal(format!("delete task failed: {e}")))??;

        Ok(removed)
    }

}
