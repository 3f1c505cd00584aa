//! Paginated dashboard queries over the search index.
//!
//! Pages are cached per owner, query and page number. Each entry remembers
//! the owner's cache version when it was stored; a mutation bumps the
//! version, so stale pages are never served. Entries also expire after the
//! configured TTL.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::interfaces::{CacheVersions, SearchDocument, SearchFilters, SearchIndex, SearchQuery};
use crate::model::Owner;
use crate::utils::clock::Clock;

/// Dashboard request. `page` is 1-indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardQuery {
    pub text: Option<String>,
    #[serde(flatten)]
    pub filters: SearchFilters,
    pub page: usize,
    pub hits_per_page: Option<usize>,
}

/// One dashboard page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPage {
    pub hits: Vec<SearchDocument>,
    pub page: usize,
    pub hits_per_page: usize,
    pub total_hits: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PageKey {
    owner: Owner,
    fingerprint: u64,
    page: usize,
}

struct CachedPage {
    version: u64,
    stored_at: DateTime<Utc>,
    page: DashboardPage,
}

pub struct Dashboard {
    index: Arc<dyn SearchIndex>,
    versions: Arc<dyn CacheVersions>,
    clock: Arc<dyn Clock>,
    config: DashboardConfig,
    pages: RwLock<HashMap<PageKey, CachedPage>>,
}

impl Dashboard {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        versions: Arc<dyn CacheVersions>,
        clock: Arc<dyn Clock>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            index,
            versions,
            clock,
            config,
            pages: RwLock::new(HashMap::new()),
        }
    }

    /// Hits per page after clamping to the configured bounds.
    pub fn hits_per_page(&self, requested: Option<usize>) -> usize {
        let min = self.config.min_hits.max(1);
        let max = self.config.max_hits.max(min);
        requested.unwrap_or(min).clamp(min, max)
    }

    #[tracing::instrument(name = "dashboard.query", skip_all, fields(owner = %owner, page = query.page))]
    pub async fn query(&self, owner: &Owner, query: &DashboardQuery) -> Result<DashboardPage> {
        if let (Some(from), Some(to)) = (query.filters.applied_from, query.filters.applied_to) {
            if from > to {
                return Err(Error::Validation(
                    "appliedFrom is after appliedTo".to_string(),
                ));
            }
        }

        let page = query.page.max(1);
        let hits_per_page = self.hits_per_page(query.hits_per_page);
        let key = PageKey {
            owner: owner.clone(),
            fingerprint: fingerprint(query, hits_per_page),
            page,
        };

        // Without a version nothing can be validated, so skip the cache.
        let version = match self.versions.version(owner).await {
            Ok(version) => Some(version),
            Err(e) => {
                warn!(error = %e, "Cache version unavailable, bypassing page cache");
                None
            }
        };

        if let Some(version) = version {
            if let Some(hit) = self.cached(&key, version).await {
                debug!(version, "Dashboard page served from cache");
                return Ok(hit);
            }
        }

        let result = self
            .index
            .search(&SearchQuery {
                owner: owner.clone(),
                text: query.text.clone().filter(|t| !t.trim().is_empty()),
                filters: query.filters.clone(),
                page: page - 1,
                hits_per_page,
            })
            .await?;

        let dashboard_page = DashboardPage {
            hits: result.hits,
            page,
            hits_per_page,
            total_hits: result.nb_hits,
            total_pages: result.nb_hits.div_ceil(hits_per_page),
        };

        if let Some(version) = version {
            self.pages.write().await.insert(
                key,
                CachedPage {
                    version,
                    stored_at: self.clock.now(),
                    page: dashboard_page.clone(),
                },
            );
        }
        Ok(dashboard_page)
    }

    async fn cached(&self, key: &PageKey, version: u64) -> Option<DashboardPage> {
        let pages = self.pages.read().await;
        let entry = pages.get(key)?;
        let age = self.clock.now() - entry.stored_at;
        let fresh = age.to_std().is_ok_and(|age| age < self.config.cache_ttl());
        (entry.version == version && fresh).then(|| entry.page.clone())
    }

    /// Drop every cached page of an owner.
    pub async fn forget(&self, owner: &Owner) {
        self.pages.write().await.retain(|key, _| &key.owner != owner);
    }
}

/// Stable identity of a query apart from its page number.
fn fingerprint(query: &DashboardQuery, hits_per_page: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.text.hash(&mut hasher);
    query.filters.hash(&mut hasher);
    hits_per_page.hash(&mut hasher);
    hasher.finish()
}
