//! Concrete mutations run by the coordinator.
//!
//! Each mutation performs one atomic authoritative-store write and
//! describes what to publish, how to undo the write and which profile
//! counters follow it.

use async_trait::async_trait;
use uuid::Uuid;

use crate::events::{
    ApplicationEvent, DeleteEvent, EventMessage, OperationKind, RevertEvent, RevertLatestEvent,
    StatusEvent,
};
use crate::interfaces::{ApplicationStore, StoreError};
use crate::model::{
    Application, ApplicationFields, ApplicationId, ApplicationStatus, CounterDelta,
    NewApplication, Owner,
};

/// Undo action for a committed write.
#[derive(Debug, Clone, PartialEq)]
pub enum Compensation {
    /// Remove a created application.
    Remove { owner: Owner, id: ApplicationId },
    /// Put back the descriptive fields as they were.
    RestoreFields {
        owner: Owner,
        id: ApplicationId,
        fields: ApplicationFields,
    },
    /// Put back the status as it was.
    RestoreStatus {
        owner: Owner,
        id: ApplicationId,
        status: ApplicationStatus,
    },
    /// Recreate a removed application.
    Restore(Application),
    /// Nothing was written.
    Nothing,
}

impl Compensation {
    pub(crate) async fn run(&self, store: &dyn ApplicationStore) -> Result<(), StoreError> {
        match self {
            Compensation::Remove { owner, id } => store.remove(owner, id).await.map(|_| ()),
            Compensation::RestoreFields { owner, id, fields } => store
                .replace_fields(owner, id, fields.clone())
                .await
                .map(|_| ()),
            Compensation::RestoreStatus { owner, id, status } => {
                store.replace_status(owner, id, *status).await.map(|_| ())
            }
            Compensation::Restore(app) => store.put(app.clone()).await,
            Compensation::Nothing => Ok(()),
        }
    }
}

/// Result of a committed write.
#[derive(Debug)]
pub struct Committed<T> {
    pub output: T,
    /// `None` when the write changed nothing; no event is published.
    pub event: Option<EventMessage>,
    pub compensation: Compensation,
    /// Applied best-effort after a successful publish.
    pub counters: Vec<CounterDelta>,
    /// Whether list membership or order may have changed.
    pub bump_cache: bool,
}

impl<T> Committed<T> {
    fn unchanged(output: T) -> Self {
        Self {
            output,
            event: None,
            compensation: Compensation::Nothing,
            counters: Vec::new(),
            bump_cache: false,
        }
    }
}

/// A single authoritative-store write with its event and compensation.
#[async_trait]
pub trait Mutation: Send {
    type Output: Send + 'static;

    fn operation(&self) -> OperationKind;

    fn owner(&self) -> &Owner;

    /// Apply the write. `timestamp` is the event time to stamp on the event.
    async fn apply(
        self,
        store: &dyn ApplicationStore,
        timestamp: i64,
    ) -> Result<Committed<Self::Output>, StoreError>;
}

/// Create an application. Not idempotent: a retried add creates a second
/// record.
#[derive(Debug, Clone)]
pub struct AddApplication {
    pub owner: Owner,
    pub application: NewApplication,
}

#[async_trait]
impl Mutation for AddApplication {
    type Output = Application;

    fn operation(&self) -> OperationKind {
        OperationKind::Add
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    async fn apply(
        self,
        store: &dyn ApplicationStore,
        timestamp: i64,
    ) -> Result<Committed<Application>, StoreError> {
        let app = store.insert(&self.owner, self.application).await?;
        Ok(Committed {
            event: Some(EventMessage::Add(ApplicationEvent::from_application(
                &app, timestamp,
            ))),
            compensation: Compensation::Remove {
                owner: app.owner.clone(),
                id: app.id.clone(),
            },
            counters: vec![
                CounterDelta::Applications(1),
                CounterDelta::Status(app.status, 1),
            ],
            bump_cache: true,
            output: app,
        })
    }
}

/// Replace the descriptive fields of an application.
#[derive(Debug, Clone)]
pub struct EditApplication {
    pub owner: Owner,
    pub id: ApplicationId,
    pub fields: ApplicationFields,
}

#[async_trait]
impl Mutation for EditApplication {
    type Output = Application;

    fn operation(&self) -> OperationKind {
        OperationKind::Edit
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    async fn apply(
        self,
        store: &dyn ApplicationStore,
        timestamp: i64,
    ) -> Result<Committed<Application>, StoreError> {
        let previous = store
            .replace_fields(&self.owner, &self.id, self.fields.clone())
            .await?;
        let mut current = previous.clone();
        current.fields = self.fields;
        if current == previous {
            return Ok(Committed::unchanged(current));
        }
        Ok(Committed {
            event: Some(EventMessage::Edit(ApplicationEvent::from_application(
                &current, timestamp,
            ))),
            compensation: Compensation::RestoreFields {
                owner: self.owner,
                id: self.id,
                fields: previous.fields,
            },
            counters: Vec::new(),
            bump_cache: true,
            output: current,
        })
    }
}

/// Change the status of an application.
#[derive(Debug, Clone)]
pub struct EditStatus {
    pub owner: Owner,
    pub id: ApplicationId,
    pub status: ApplicationStatus,
}

#[async_trait]
impl Mutation for EditStatus {
    type Output = Application;

    fn operation(&self) -> OperationKind {
        OperationKind::EditStatus
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    async fn apply(
        self,
        store: &dyn ApplicationStore,
        timestamp: i64,
    ) -> Result<Committed<Application>, StoreError> {
        let previous = store
            .replace_status(&self.owner, &self.id, self.status)
            .await?;
        let mut current = previous.clone();
        current.status = self.status;
        if previous.status == self.status {
            return Ok(Committed::unchanged(current));
        }
        Ok(Committed {
            event: Some(EventMessage::EditStatus(StatusEvent {
                operation_id: Uuid::new_v4(),
                owner: self.owner.clone(),
                object_id: self.id.clone(),
                status: self.status,
                applied_date: current.fields.applied_date,
                timestamp,
            })),
            compensation: Compensation::RestoreStatus {
                owner: self.owner,
                id: self.id,
                status: previous.status,
            },
            counters: vec![
                CounterDelta::Status(self.status, 1),
                CounterDelta::Status(previous.status, -1),
            ],
            bump_cache: true,
            output: current,
        })
    }
}

/// Delete an application.
///
/// Deleting a missing application still publishes, so a retry after a
/// failed publish converges the derived stores.
#[derive(Debug, Clone)]
pub struct DeleteApplication {
    pub owner: Owner,
    pub id: ApplicationId,
}

#[async_trait]
impl Mutation for DeleteApplication {
    /// The removed application, if it existed.
    type Output = Option<Application>;

    fn operation(&self) -> OperationKind {
        OperationKind::Delete
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    async fn apply(
        self,
        store: &dyn ApplicationStore,
        _timestamp: i64,
    ) -> Result<Committed<Option<Application>>, StoreError> {
        let removed = store.remove(&self.owner, &self.id).await?;
        let (compensation, counters) = match &removed {
            Some(app) => (
                Compensation::Restore(app.clone()),
                vec![
                    CounterDelta::Applications(-1),
                    CounterDelta::Status(app.status, -1),
                ],
            ),
            None => (Compensation::Nothing, Vec::new()),
        };
        Ok(Committed {
            event: Some(EventMessage::Delete(DeleteEvent {
                operation_id: Uuid::new_v4(),
                owner: self.owner,
                object_id: self.id,
            })),
            compensation,
            counters,
            bump_cache: true,
            output: removed,
        })
    }
}

/// Flag a historical event as reverted. Live state is untouched.
#[derive(Debug, Clone)]
pub struct RevertHistorical {
    pub owner: Owner,
    pub id: ApplicationId,
    pub reverted_operation_id: Uuid,
}

#[async_trait]
impl Mutation for RevertHistorical {
    /// Live status, unchanged.
    type Output = ApplicationStatus;

    fn operation(&self) -> OperationKind {
        OperationKind::Revert
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    async fn apply(
        self,
        store: &dyn ApplicationStore,
        _timestamp: i64,
    ) -> Result<Committed<ApplicationStatus>, StoreError> {
        let app = store
            .get(&self.owner, &self.id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                owner: self.owner.clone(),
                id: self.id.clone(),
            })?;
        Ok(Committed {
            event: Some(EventMessage::Revert(RevertEvent {
                operation_id: Uuid::new_v4(),
                owner: self.owner,
                object_id: self.id,
                reverted_operation_id: self.reverted_operation_id,
            })),
            compensation: Compensation::Nothing,
            counters: Vec::new(),
            bump_cache: false,
            output: app.status,
        })
    }
}

/// Undo the latest event of a job by restoring the status it replaced.
#[derive(Debug, Clone)]
pub struct RevertLatest {
    pub owner: Owner,
    pub id: ApplicationId,
    pub reverted_operation_id: Uuid,
    pub restore_status: ApplicationStatus,
}

#[async_trait]
impl Mutation for RevertLatest {
    /// Restored live status.
    type Output = ApplicationStatus;

    fn operation(&self) -> OperationKind {
        OperationKind::RevertLatest
    }

    fn owner(&self) -> &Owner {
        &self.owner
    }

    async fn apply(
        self,
        store: &dyn ApplicationStore,
        timestamp: i64,
    ) -> Result<Committed<ApplicationStatus>, StoreError> {
        let previous = store
            .replace_status(&self.owner, &self.id, self.restore_status)
            .await?;
        let counters = if previous.status == self.restore_status {
            Vec::new()
        } else {
            vec![
                CounterDelta::Status(self.restore_status, 1),
                CounterDelta::Status(previous.status, -1),
            ]
        };
        Ok(Committed {
            event: Some(EventMessage::RevertLatest(RevertLatestEvent {
                operation_id: Uuid::new_v4(),
                owner: self.owner.clone(),
                object_id: self.id.clone(),
                reverted_operation_id: self.reverted_operation_id,
                status: self.restore_status,
                timestamp,
            })),
            compensation: Compensation::RestoreStatus {
                owner: self.owner,
                id: self.id,
                status: previous.status,
            },
            counters,
            bump_cache: true,
            output: self.restore_status,
        })
    }
}
