//! Revert of one of the two most recent events of a job.
//!
//! Only the latest two non-reverted warehouse rows are considered:
//! - the older one is history, so reverting it flags the row and leaves the
//!   live application alone
//! - the newer one is the live value, so reverting it restores the older
//!   row's status through the coordinator, which publishes `revertLatest`
//!   and compensates if that publish fails
//!
//! Deeper history is not revertible.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::coordinator::{MutationCoordinator, RevertHistorical, RevertLatest};
use crate::error::{Error, Result};
use crate::interfaces::Warehouse;
use crate::model::{ApplicationId, ApplicationStatus, Owner};

/// Events inspected per revert.
const REVERTIBLE_DEPTH: usize = 2;

pub struct RevertResolver {
    coordinator: Arc<MutationCoordinator>,
    warehouse: Arc<dyn Warehouse>,
}

impl RevertResolver {
    pub fn new(coordinator: Arc<MutationCoordinator>, warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            coordinator,
            warehouse,
        }
    }

    /// Revert `operation_id` on a job and return the job's live status
    /// afterwards.
    #[tracing::instrument(
        name = "revert.resolve",
        skip_all,
        fields(owner = %owner, job_id = %job_id, operation_id = %operation_id)
    )]
    pub async fn revert(
        &self,
        owner: &Owner,
        job_id: &ApplicationId,
        operation_id: Uuid,
    ) -> Result<ApplicationStatus> {
        let rows = self
            .warehouse
            .latest_events(owner, job_id, REVERTIBLE_DEPTH)
            .await?;
        let [latest, previous] = rows.as_slice() else {
            return Err(Error::RevertConflict(format!(
                "job {job_id} has {} revertible events, need two",
                rows.len()
            )));
        };

        if latest.operation_id == operation_id {
            let status = self
                .coordinator
                .perform(RevertLatest {
                    owner: owner.clone(),
                    id: job_id.clone(),
                    reverted_operation_id: operation_id,
                    restore_status: previous.status,
                })
                .await?;
            info!(restored = %status, "Latest event reverted");
            Ok(status)
        } else if previous.operation_id == operation_id {
            let status = self
                .coordinator
                .perform(RevertHistorical {
                    owner: owner.clone(),
                    id: job_id.clone(),
                    reverted_operation_id: operation_id,
                })
                .await?;
            info!(current = %status, "Historical event reverted");
            Ok(status)
        } else {
            Err(Error::RevertConflict(format!(
                "operation {operation_id} is not one of the two latest events of job {job_id}"
            )))
        }
    }
}

#[cfg(test)]
mod tests;
