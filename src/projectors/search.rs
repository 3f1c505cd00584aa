//! Search index projector.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::events::{ApplicationEvent, EventMessage};
use crate::interfaces::projector::{Projector, ProjectorError, Result};
use crate::interfaces::{CacheVersions, SearchDocument, SearchIndex, StatusPatch};
use crate::model::Owner;

/// Mirrors applications into the search index.
///
/// Bulk owner deletes are serialized: they are the most expensive index
/// operation and must not pile up.
///
/// Every index write bumps the owner's cache version once it lands. A
/// dashboard page cached between the producer's bump and this write would
/// otherwise hold pre-write hits under the current version.
pub struct SearchProjector {
    index: Arc<dyn SearchIndex>,
    cache: Arc<dyn CacheVersions>,
    bulk_deletes: Semaphore,
}

impl SearchProjector {
    pub fn new(index: Arc<dyn SearchIndex>, cache: Arc<dyn CacheVersions>) -> Self {
        Self {
            index,
            cache,
            bulk_deletes: Semaphore::new(1),
        }
    }

    /// Best-effort; the cache TTL bounds staleness if this fails.
    async fn invalidate(&self, owner: &Owner) {
        match self.cache.bump(owner).await {
            Ok(version) => debug!(owner = %owner, version, "Cache version bumped after index write"),
            Err(e) => warn!(owner = %owner, error = %e, "Cache version bump failed"),
        }
    }
}

fn document(event: &ApplicationEvent) -> SearchDocument {
    SearchDocument {
        object_id: event.object_id.clone(),
        owner: event.owner.clone(),
        role: event.role.clone(),
        company: event.company.clone(),
        location: event.location.clone(),
        applied_date: event.applied_date,
        status: event.status,
        link: event.link.clone(),
    }
}

#[async_trait]
impl Projector for SearchProjector {
    fn name(&self) -> &str {
        "search"
    }

    #[tracing::instrument(
        name = "projector.search",
        skip_all,
        fields(operation = %event.operation(), operation_id = %event.operation_id())
    )]
    async fn project(&self, event: &EventMessage) -> Result<()> {
        let changed = match event {
            EventMessage::Add(e) | EventMessage::Edit(e) => {
                self.index.upsert(document(e)).await?;
                true
            }
            EventMessage::EditStatus(e) => {
                let patch = StatusPatch {
                    status: e.status,
                    applied_date: Some(e.applied_date),
                };
                let updated = self.index.update_status(&e.owner, &e.object_id, patch).await?;
                if !updated {
                    debug!(job_id = %e.object_id, "Status update for absent document skipped");
                }
                updated
            }
            EventMessage::Delete(e) => {
                self.index.delete(&e.owner, &e.object_id).await?
            }
            EventMessage::UserDelete(e) => {
                let _permit = self
                    .bulk_deletes
                    .acquire()
                    .await
                    .map_err(|err| ProjectorError::Failed(err.to_string()))?;
                let started = Instant::now();
                let removed = self.index.delete_by_owner(&e.owner).await?;
                info!(
                    owner = %e.owner,
                    removed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Owner removed from search index"
                );
                true
            }
            // History only; the indexed status is already current.
            EventMessage::Revert(_) => false,
            EventMessage::RevertLatest(e) => {
                let patch = StatusPatch {
                    status: e.status,
                    applied_date: None,
                };
                let updated = self.index.update_status(&e.owner, &e.object_id, patch).await?;
                if !updated {
                    debug!(job_id = %e.object_id, "Revert for absent document skipped");
                }
                updated
            }
        };
        if changed {
            self.invalidate(event.owner()).await;
        }
        Ok(())
    }
}
