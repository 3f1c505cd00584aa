//! Authoritative application store interface.

use async_trait::async_trait;

use crate::model::{
    AnalyticsSnapshot, Application, ApplicationFields, ApplicationId, ApplicationStatus,
    CounterDelta, NewApplication, Owner, OwnerProfile,
};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during authoritative-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Application not found: owner={owner}, id={id}")]
    NotFound { owner: Owner, id: ApplicationId },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store operation failed: {0}")]
    Failed(String),
}

/// Interface for the authoritative application store.
///
/// Every method is a single atomic server-side operation. Writes that
/// replace state return the previous value so callers can compensate
/// without an extra read.
///
/// Implementations:
/// - `MockApplicationStore`: in-memory store with fail injection
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Create an application; the store assigns its id.
    async fn insert(&self, owner: &Owner, application: NewApplication) -> Result<Application>;

    async fn get(&self, owner: &Owner, id: &ApplicationId) -> Result<Option<Application>>;

    /// Replace the descriptive fields, returning the application as it was.
    async fn replace_fields(
        &self,
        owner: &Owner,
        id: &ApplicationId,
        fields: ApplicationFields,
    ) -> Result<Application>;

    /// Replace the status, returning the application as it was.
    async fn replace_status(
        &self,
        owner: &Owner,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application>;

    /// Remove an application, returning it if it existed.
    ///
    /// Removing a missing application is not an error.
    async fn remove(&self, owner: &Owner, id: &ApplicationId) -> Result<Option<Application>>;

    /// Create or overwrite an application record as given.
    async fn put(&self, application: Application) -> Result<()>;

    /// Remove every application and the profile of an owner.
    ///
    /// Not compensable: callers run it only after the matching event is
    /// published.
    async fn remove_owner(&self, owner: &Owner) -> Result<usize>;

    async fn count(&self, owner: &Owner) -> Result<usize>;

    async fn profile(&self, owner: &Owner) -> Result<OwnerProfile>;

    /// Apply increments to the denormalized profile counters.
    async fn apply_counters(&self, owner: &Owner, deltas: &[CounterDelta]) -> Result<()>;

    /// Merge an analytics snapshot into the profile, leaving counters intact.
    async fn merge_analytics(&self, owner: &Owner, snapshot: &AnalyticsSnapshot) -> Result<()>;
}
