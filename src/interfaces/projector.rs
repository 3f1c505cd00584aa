//! Projector interface.
//!
//! Projectors apply one event to a derived read model.

use async_trait::async_trait;

use super::application_store::StoreError;
use super::search_index::SearchError;
use super::warehouse::WarehouseError;
use crate::events::EventMessage;

/// Result type for projector operations.
pub type Result<T> = std::result::Result<T, ProjectorError>;

/// Errors from projector operations.
///
/// A projector error is isolated to its message: the message is redelivered
/// and the projector must tolerate seeing it again.
#[derive(Debug, thiserror::Error)]
pub enum ProjectorError {
    #[error("Undecodable event: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Search index error: {0}")]
    Search(#[from] SearchError),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Projection failed: {0}")]
    Failed(String),
}

impl ProjectorError {
    /// Redelivering will never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ProjectorError::Decode(_))
    }
}

/// In-process projector interface.
///
/// `project` must be idempotent: applying the same event twice leaves the
/// read model as applying it once does.
#[async_trait]
pub trait Projector: Send + Sync {
    /// Name of this projector, used in logs and subscription names.
    fn name(&self) -> &str;

    async fn project(&self, event: &EventMessage) -> Result<()>;
}
