//! Crate-level error taxonomy.
//!
//! Validation and auth errors fail fast before any write. Store errors
//! happen before an event exists and need no compensation. Publish errors
//! follow a committed write that has since been compensated, so the client
//! may safely retry. A compensation error means the authoritative store and
//! the derived views may disagree until reconciled by hand.

use crate::interfaces::{
    AuthError, BusError, ProjectorError, SearchError, StoreError, WarehouseError,
};

/// Result type for coordinator, resolver and service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Auth(#[from] AuthError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Publish failed, write rolled back: {0}")]
    Publish(#[source] BusError),

    #[error("Compensation failed after publish error ({publish}): {compensation}")]
    Compensation {
        publish: BusError,
        #[source]
        compensation: StoreError,
    },

    #[error("Projector error: {0}")]
    Projector(#[from] ProjectorError),

    #[error("Revert conflict: {0}")]
    RevertConflict(String),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The client may retry the same request: authoritative state was
    /// restored to what it was before the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Publish(_))
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { owner, id } => {
                Error::NotFound(format!("application {id} of {owner}"))
            }
            other => Error::Store(other),
        }
    }
}
