//! Warehouse projector and analytics write-back.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::events::{EventMessage, EventRow};
use crate::interfaces::projector::{Projector, Result};
use crate::interfaces::{ApplicationStore, Warehouse};
use crate::model::Owner;
use crate::utils::clock::Clock;

/// Appends events to the warehouse and writes recomputed analytics back to
/// the owner's profile.
pub struct WarehouseProjector {
    warehouse: Arc<dyn Warehouse>,
    store: Arc<dyn ApplicationStore>,
    clock: Arc<dyn Clock>,
}

impl WarehouseProjector {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        store: Arc<dyn ApplicationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            warehouse,
            store,
            clock,
        }
    }

    async fn recompute(&self, owner: &Owner) -> Result<()> {
        let snapshot = self.warehouse.aggregate(owner, self.clock.now()).await?;
        self.store.merge_analytics(owner, &snapshot).await?;
        debug!(
            owner = %owner,
            velocity = snapshot.application_velocity,
            "Analytics written back"
        );
        Ok(())
    }
}

#[async_trait]
impl Projector for WarehouseProjector {
    fn name(&self) -> &str {
        "warehouse"
    }

    #[tracing::instrument(
        name = "projector.warehouse",
        skip_all,
        fields(operation = %event.operation(), operation_id = %event.operation_id())
    )]
    async fn project(&self, event: &EventMessage) -> Result<()> {
        match event {
            EventMessage::Add(_) | EventMessage::Edit(_) | EventMessage::EditStatus(_) => {
                if let Some(row) = EventRow::from_message(event) {
                    if !self.warehouse.insert(row).await? {
                        debug!("Event already recorded");
                    }
                }
            }
            EventMessage::Delete(e) => {
                let removed = self.warehouse.delete_job(&e.owner, &e.object_id).await?;
                debug!(job_id = %e.object_id, removed, "Job rows deleted");
            }
            EventMessage::UserDelete(e) => {
                let removed = self.warehouse.delete_owner(&e.owner).await?;
                info!(owner = %e.owner, removed, "Owner rows deleted");
                // The profile goes away with the owner.
                return Ok(());
            }
            EventMessage::Revert(e) => {
                self.warehouse
                    .flag_reverted(&e.owner, &e.object_id, e.reverted_operation_id)
                    .await?;
            }
            EventMessage::RevertLatest(e) => {
                self.warehouse
                    .flag_reverted(&e.owner, &e.object_id, e.reverted_operation_id)
                    .await?;
            }
        }
        self.recompute(event.owner()).await
    }
}
