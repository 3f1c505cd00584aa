//! Replication events.
//!
//! [`EventMessage`] is the payload the coordinator publishes and projectors
//! consume. It is a tagged union keyed by the `operation` field so that each
//! projector matches on a variant instead of probing a loose map.
//!
//! Wire format (JSON, camelCase):
//!
//! ```json
//! {"operation":"editStatus","operationId":"…","owner":"kim@example.com",
//!  "objectID":"a1","status":"Screen","appliedDate":1700000000,"timestamp":1700086400}
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Application, ApplicationId, ApplicationStatus, Owner};

const SECONDS_PER_DAY: i64 = 86_400;
const NOON_OFFSET: i64 = 12 * 3_600;

/// Operation kind, as carried on the bus and stored in the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Add,
    Edit,
    EditStatus,
    Delete,
    UserDelete,
    Revert,
    RevertLatest,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Edit => "edit",
            OperationKind::EditStatus => "editStatus",
            OperationKind::Delete => "delete",
            OperationKind::UserDelete => "userDelete",
            OperationKind::Revert => "revert",
            OperationKind::RevertLatest => "revertLatest",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full application state, published on add and edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEvent {
    pub operation_id: Uuid,
    pub owner: Owner,
    #[serde(rename = "objectID")]
    pub object_id: ApplicationId,
    pub role: String,
    pub company: String,
    pub location: String,
    pub link: String,
    pub applied_date: i64,
    pub status: ApplicationStatus,
    pub timestamp: i64,
}

impl ApplicationEvent {
    pub fn from_application(app: &Application, timestamp: i64) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            owner: app.owner.clone(),
            object_id: app.id.clone(),
            role: app.fields.role.clone(),
            company: app.fields.company.clone(),
            location: app.fields.location.clone(),
            link: app.fields.link.clone(),
            applied_date: app.fields.applied_date,
            status: app.status,
            timestamp,
        }
    }
}

/// Status change of one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub operation_id: Uuid,
    pub owner: Owner,
    #[serde(rename = "objectID")]
    pub object_id: ApplicationId,
    pub status: ApplicationStatus,
    pub applied_date: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteEvent {
    pub operation_id: Uuid,
    pub owner: Owner,
    #[serde(rename = "objectID")]
    pub object_id: ApplicationId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleteEvent {
    pub operation_id: Uuid,
    pub owner: Owner,
}

/// Flags a historical event as reverted. Live state is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertEvent {
    pub operation_id: Uuid,
    pub owner: Owner,
    #[serde(rename = "objectID")]
    pub object_id: ApplicationId,
    pub reverted_operation_id: Uuid,
}

/// Undoes the latest event of a job and restores the previous status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertLatestEvent {
    pub operation_id: Uuid,
    pub owner: Owner,
    #[serde(rename = "objectID")]
    pub object_id: ApplicationId,
    pub reverted_operation_id: Uuid,
    /// Status restored onto the live application.
    pub status: ApplicationStatus,
    pub timestamp: i64,
}

/// Event published after a committed authoritative-store write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum EventMessage {
    Add(ApplicationEvent),
    Edit(ApplicationEvent),
    EditStatus(StatusEvent),
    Delete(DeleteEvent),
    UserDelete(UserDeleteEvent),
    Revert(RevertEvent),
    RevertLatest(RevertLatestEvent),
}

impl EventMessage {
    pub fn operation(&self) -> OperationKind {
        match self {
            EventMessage::Add(_) => OperationKind::Add,
            EventMessage::Edit(_) => OperationKind::Edit,
            EventMessage::EditStatus(_) => OperationKind::EditStatus,
            EventMessage::Delete(_) => OperationKind::Delete,
            EventMessage::UserDelete(_) => OperationKind::UserDelete,
            EventMessage::Revert(_) => OperationKind::Revert,
            EventMessage::RevertLatest(_) => OperationKind::RevertLatest,
        }
    }

    pub fn operation_id(&self) -> Uuid {
        match self {
            EventMessage::Add(e) | EventMessage::Edit(e) => e.operation_id,
            EventMessage::EditStatus(e) => e.operation_id,
            EventMessage::Delete(e) => e.operation_id,
            EventMessage::UserDelete(e) => e.operation_id,
            EventMessage::Revert(e) => e.operation_id,
            EventMessage::RevertLatest(e) => e.operation_id,
        }
    }

    pub fn owner(&self) -> &Owner {
        match self {
            EventMessage::Add(e) | EventMessage::Edit(e) => &e.owner,
            EventMessage::EditStatus(e) => &e.owner,
            EventMessage::Delete(e) => &e.owner,
            EventMessage::UserDelete(e) => &e.owner,
            EventMessage::Revert(e) => &e.owner,
            EventMessage::RevertLatest(e) => &e.owner,
        }
    }

    /// Job the event applies to; `None` for owner-wide events.
    pub fn object_id(&self) -> Option<&ApplicationId> {
        match self {
            EventMessage::Add(e) | EventMessage::Edit(e) => Some(&e.object_id),
            EventMessage::EditStatus(e) => Some(&e.object_id),
            EventMessage::Delete(e) => Some(&e.object_id),
            EventMessage::UserDelete(_) => None,
            EventMessage::Revert(e) => Some(&e.object_id),
            EventMessage::RevertLatest(e) => Some(&e.object_id),
        }
    }

    /// Ordering key: all events of one owner are delivered in publish order.
    pub fn ordering_key(&self) -> &str {
        self.owner().as_str()
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// One row of the append-only warehouse event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    pub operation_id: Uuid,
    pub owner: Owner,
    pub job_id: ApplicationId,
    pub event_time: i64,
    pub applied_date: i64,
    pub status: ApplicationStatus,
    /// Flipped to [`OperationKind::Revert`] when the row is reverted.
    pub operation: OperationKind,
}

impl EventRow {
    /// Build the row appended for an add, edit or editStatus event.
    pub fn from_message(message: &EventMessage) -> Option<Self> {
        match message {
            EventMessage::Add(e) | EventMessage::Edit(e) => Some(Self {
                operation_id: e.operation_id,
                owner: e.owner.clone(),
                job_id: e.object_id.clone(),
                event_time: e.timestamp,
                applied_date: e.applied_date,
                status: e.status,
                operation: message.operation(),
            }),
            EventMessage::EditStatus(e) => Some(Self {
                operation_id: e.operation_id,
                owner: e.owner.clone(),
                job_id: e.object_id.clone(),
                event_time: e.timestamp,
                applied_date: e.applied_date,
                status: e.status,
                operation: OperationKind::EditStatus,
            }),
            _ => None,
        }
    }

    pub fn is_reverted(&self) -> bool {
        self.operation == OperationKind::Revert
    }
}

/// Event time for a mutation happening at `now`: noon UTC of that day.
///
/// Applied dates are stamped at noon too, so the day difference between an
/// apply date and a later status change is always a whole number.
pub fn event_timestamp(now: DateTime<Utc>) -> i64 {
    noon_of(now.timestamp())
}

/// Noon UTC of the day containing unix second `secs`.
pub fn noon_of(secs: i64) -> i64 {
    secs - secs.rem_euclid(SECONDS_PER_DAY) + NOON_OFFSET
}
