//! Per-owner cache version interface.

use async_trait::async_trait;

use crate::model::Owner;

/// Errors from the cache layer. Always non-fatal to callers.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Monotonic per-owner counter invalidating cached pagination entries.
#[async_trait]
pub trait CacheVersions: Send + Sync {
    async fn version(&self, owner: &Owner) -> Result<u64, CacheError>;

    /// Increment and return the new version.
    async fn bump(&self, owner: &Owner) -> Result<u64, CacheError>;
}
