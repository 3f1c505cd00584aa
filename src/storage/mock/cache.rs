//! Mock CacheVersions implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::interfaces::cache::{CacheError, CacheVersions};
use crate::model::Owner;

/// Mock per-owner cache versions.
#[derive(Default)]
pub struct MockCacheVersions {
    versions: RwLock<HashMap<Owner, u64>>,
    fail: RwLock<bool>,
}

impl MockCacheVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    async fn check(&self) -> Result<(), CacheError> {
        if *self.fail.read().await {
            return Err(CacheError::Unavailable("cache disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheVersions for MockCacheVersions {
    async fn version(&self, owner: &Owner) -> Result<u64, CacheError> {
        self.check().await?;
        Ok(self.versions.read().await.get(owner).copied().unwrap_or(0))
    }

    async fn bump(&self, owner: &Owner) -> Result<u64, CacheError> {
        self.check().await?;
        let mut versions = self.versions.write().await;
        let version = versions.entry(owner.clone()).or_insert(0);
        *version += 1;
        Ok(*version)
    }
}
