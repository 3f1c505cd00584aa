//! Mock Warehouse implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::analytics;
use crate::events::{EventRow, OperationKind};
use crate::interfaces::warehouse::{Result, Warehouse, WarehouseError};
use crate::model::{AnalyticsSnapshot, ApplicationId, Owner};

/// Row with its insertion sequence, used to break event-time ties.
struct StoredRow {
    seq: u64,
    row: EventRow,
}

#[derive(Default)]
struct Log {
    rows: Vec<StoredRow>,
    next_seq: u64,
}

/// Mock warehouse keeping the event log in memory.
#[derive(Default)]
pub struct MockWarehouse {
    log: RwLock<Log>,
    fail_on_write: RwLock<bool>,
    fail_on_read: RwLock<bool>,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    pub async fn row_count(&self, owner: &Owner) -> usize {
        let log = self.log.read().await;
        log.rows.iter().filter(|s| &s.row.owner == owner).count()
    }

    async fn check_write(&self) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(WarehouseError::Unavailable("write disabled".to_string()));
        }
        Ok(())
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(WarehouseError::Unavailable("read disabled".to_string()));
        }
        Ok(())
    }

    /// Rows of a job, newest first.
    async fn job_rows<F>(&self, owner: &Owner, job_id: &ApplicationId, keep: F) -> Vec<EventRow>
    where
        F: Fn(&EventRow) -> bool + Send,
    {
        let log = self.log.read().await;
        let mut rows: Vec<&StoredRow> = log
            .rows
            .iter()
            .filter(|s| &s.row.owner == owner && &s.row.job_id == job_id && keep(&s.row))
            .collect();
        rows.sort_by(|a, b| {
            b.row
                .event_time
                .cmp(&a.row.event_time)
                .then_with(|| b.seq.cmp(&a.seq))
        });
        rows.into_iter().map(|s| s.row.clone()).collect()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn insert(&self, row: EventRow) -> Result<bool> {
        self.check_write().await?;
        let mut log = self.log.write().await;
        if log
            .rows
            .iter()
            .any(|s| s.row.operation_id == row.operation_id)
        {
            return Ok(false);
        }
        let seq = log.next_seq;
        log.next_seq += 1;
        log.rows.push(StoredRow { seq, row });
        Ok(true)
    }

    async fn delete_job(&self, owner: &Owner, job_id: &ApplicationId) -> Result<usize> {
        self.check_write().await?;
        let mut log = self.log.write().await;
        let before = log.rows.len();
        log.rows
            .retain(|s| !(&s.row.owner == owner && &s.row.job_id == job_id));
        Ok(before - log.rows.len())
    }

    async fn delete_owner(&self, owner: &Owner) -> Result<usize> {
        self.check_write().await?;
        let mut log = self.log.write().await;
        let before = log.rows.len();
        log.rows.retain(|s| &s.row.owner != owner);
        Ok(before - log.rows.len())
    }

    async fn flag_reverted(
        &self,
        owner: &Owner,
        job_id: &ApplicationId,
        operation_id: Uuid,
    ) -> Result<bool> {
        self.check_write().await?;
        let mut log = self.log.write().await;
        let target = log.rows.iter_mut().find(|s| {
            s.row.operation_id == operation_id
                && &s.row.owner == owner
                && &s.row.job_id == job_id
        });
        match target {
            Some(stored) => {
                stored.row.operation = OperationKind::Revert;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn latest_events(
        &self,
        owner: &Owner,
        job_id: &ApplicationId,
        limit: usize,
    ) -> Result<Vec<EventRow>> {
        self.check_read().await?;
        let mut rows = self.job_rows(owner, job_id, |r| !r.is_reverted()).await;
        rows.truncate(limit);
        Ok(rows)
    }

    async fn job_events(&self, owner: &Owner, job_id: &ApplicationId) -> Result<Vec<EventRow>> {
        self.check_read().await?;
        Ok(self.job_rows(owner, job_id, |_| true).await)
    }

    async fn aggregate(&self, owner: &Owner, now: DateTime<Utc>) -> Result<AnalyticsSnapshot> {
        self.check_read().await?;
        let log = self.log.read().await;
        let rows: Vec<EventRow> = log
            .rows
            .iter()
            .filter(|s| &s.row.owner == owner)
            .map(|s| s.row.clone())
            .collect();
        Ok(analytics::compute(&rows, now))
    }
}
