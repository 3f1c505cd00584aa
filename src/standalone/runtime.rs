//! Runtime implementation for standalone mode.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::api::UserService;
use crate::auth::StaticSessionVerifier;
use crate::bus::{ChannelConfig, ChannelEventBus};
use crate::config::CopiumConfig;
use crate::coordinator::{MutationCoordinator, PublishPolicy};
use crate::dashboard::Dashboard;
use crate::projectors::{ProjectionConsumer, SearchProjector, WarehouseProjector};
use crate::storage::{MockApplicationStore, MockCacheVersions, MockSearchIndex, MockWarehouse};
use crate::utils::clock::{Clock, SystemClock};

/// Subscription names, one per derived store.
const SEARCH_SUBSCRIPTION: &str = "search-projector";
const WAREHOUSE_SUBSCRIPTION: &str = "warehouse-projector";

/// Standalone runtime for copium.
///
/// Manages all components of one process:
/// - In-memory authoritative store, search index, warehouse and cache
///   versions
/// - Channel event bus with one subscription per projector
/// - Projection consumers, each with its own dispatch pool
/// - The user service facade
pub struct Runtime {
    store: Arc<MockApplicationStore>,
    index: Arc<MockSearchIndex>,
    warehouse: Arc<MockWarehouse>,
    bus: Arc<ChannelEventBus>,
    service: Arc<UserService>,
    consumers: Vec<ProjectionConsumer>,
}

impl Runtime {
    /// Start with the system clock.
    pub async fn start(config: &CopiumConfig) -> Self {
        Self::start_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn start_with_clock(config: &CopiumConfig, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MockApplicationStore::new());
        let index = Arc::new(MockSearchIndex::new());
        let warehouse = Arc::new(MockWarehouse::new());
        let cache = Arc::new(MockCacheVersions::new());
        let bus = Arc::new(ChannelEventBus::new(ChannelConfig::from(&config.bus)));

        // Subscribe before anything can publish.
        let search_subscription = bus.subscribe(SEARCH_SUBSCRIPTION).await;
        let warehouse_subscription = bus.subscribe(WAREHOUSE_SUBSCRIPTION).await;

        let consumers = vec![
            ProjectionConsumer::start(
                search_subscription,
                Arc::new(SearchProjector::new(index.clone(), cache.clone())),
                &config.pool,
            ),
            ProjectionConsumer::start(
                warehouse_subscription,
                Arc::new(WarehouseProjector::new(
                    warehouse.clone(),
                    store.clone(),
                    clock.clone(),
                )),
                &config.pool,
            ),
        ];

        let coordinator = Arc::new(MutationCoordinator::new(
            store.clone(),
            bus.clone(),
            cache.clone(),
            clock.clone(),
            PublishPolicy::from(&config.bus),
        ));
        let dashboard = Dashboard::new(index.clone(), cache, clock, config.dashboard.clone());
        let service = Arc::new(UserService::new(
            Arc::new(StaticSessionVerifier::from(&config.auth)),
            coordinator,
            warehouse.clone(),
            dashboard,
        ));

        info!(
            workers = config.pool.workers,
            consumers = consumers.len(),
            tokens = config.auth.tokens.len(),
            "Standalone runtime started"
        );

        Self {
            store,
            index,
            warehouse,
            bus,
            service,
            consumers,
        }
    }

    pub fn service(&self) -> &Arc<UserService> {
        &self.service
    }

    pub fn store(&self) -> &Arc<MockApplicationStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<MockSearchIndex> {
        &self.index
    }

    pub fn warehouse(&self) -> &Arc<MockWarehouse> {
        &self.warehouse
    }

    pub fn bus(&self) -> &Arc<ChannelEventBus> {
        &self.bus
    }

    pub fn consumers(&self) -> &[ProjectionConsumer] {
        &self.consumers
    }

    /// Wait until every subscription has nothing queued or in flight.
    /// Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                if self
                    .consumers
                    .iter()
                    .all(|consumer| consumer.subscription().is_idle())
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(timeout, idle).await.is_ok()
    }

    /// Stop the consumers, finishing deliveries already dispatched, then
    /// close the bus.
    pub async fn shutdown(&self) {
        info!("Shutting down standalone runtime");
        for consumer in &self.consumers {
            consumer.shutdown().await;
        }
        self.bus.close().await;
        info!("Standalone runtime stopped");
    }
}
