//! Warehouse (analytics event log) interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::events::EventRow;
use crate::model::{AnalyticsSnapshot, ApplicationId, Owner};

/// Result type for warehouse operations.
pub type Result<T> = std::result::Result<T, WarehouseError>;

/// Errors that can occur during warehouse operations.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    #[error("Warehouse unavailable: {0}")]
    Unavailable(String),

    #[error("Warehouse query failed: {0}")]
    Query(String),
}

/// Interface for the append-only event log.
///
/// Rows are inserted and deleted but never updated, except for flipping the
/// operation of one row to `revert`. Ordering is by `event_time`, ties broken
/// by insertion order.
///
/// Implementations:
/// - `MockWarehouse`: in-memory log with fail injection
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Append a row. Returns false if a row with the same operation id
    /// already exists, in which case nothing is written.
    async fn insert(&self, row: EventRow) -> Result<bool>;

    /// Delete every row of one job.
    async fn delete_job(&self, owner: &Owner, job_id: &ApplicationId) -> Result<usize>;

    /// Delete every row of an owner.
    async fn delete_owner(&self, owner: &Owner) -> Result<usize>;

    /// Flag one row as reverted. Returns false if no such row exists.
    async fn flag_reverted(
        &self,
        owner: &Owner,
        job_id: &ApplicationId,
        operation_id: Uuid,
    ) -> Result<bool>;

    /// Most recent non-reverted rows of a job, newest first.
    async fn latest_events(
        &self,
        owner: &Owner,
        job_id: &ApplicationId,
        limit: usize,
    ) -> Result<Vec<EventRow>>;

    /// Every row of a job including reverted ones, newest first.
    async fn job_events(&self, owner: &Owner, job_id: &ApplicationId) -> Result<Vec<EventRow>>;

    /// Single aggregate pass over an owner's non-reverted rows, relative
    /// to `now`. An owner without rows yields a zeroed snapshot.
    async fn aggregate(&self, owner: &Owner, now: DateTime<Utc>) -> Result<AnalyticsSnapshot>;
}
