//! Search index interface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Application, ApplicationId, ApplicationStatus, Owner};

/// Result type for search index operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search index operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search index unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Application mirrored into the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchDocument {
    #[serde(rename = "objectID")]
    pub object_id: ApplicationId,
    pub owner: Owner,
    pub role: String,
    pub company: String,
    pub location: String,
    pub applied_date: i64,
    pub status: ApplicationStatus,
    pub link: String,
}

impl From<&Application> for SearchDocument {
    fn from(app: &Application) -> Self {
        Self {
            object_id: app.id.clone(),
            owner: app.owner.clone(),
            role: app.fields.role.clone(),
            company: app.fields.company.clone(),
            location: app.fields.location.clone(),
            applied_date: app.fields.applied_date,
            status: app.status,
            link: app.fields.link.clone(),
        }
    }
}

/// Partial update touching only the status and apply date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPatch {
    pub status: ApplicationStatus,
    pub applied_date: Option<i64>,
}

/// Facet and range filters for a dashboard query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub company: Option<String>,
    pub role: Option<String>,
    pub location: Option<String>,
    pub status: Option<ApplicationStatus>,
    /// Inclusive lower bound on the apply date (unix seconds).
    pub applied_from: Option<i64>,
    /// Inclusive upper bound on the apply date (unix seconds).
    pub applied_to: Option<i64>,
}

/// A paginated query scoped to one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub owner: Owner,
    pub text: Option<String>,
    pub filters: SearchFilters,
    /// Zero-based page.
    pub page: usize,
    pub hits_per_page: usize,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub hits: Vec<SearchDocument>,
    /// Total matching documents across all pages.
    pub nb_hits: usize,
}

/// Interface for the search index.
///
/// All writes are idempotent: repeating one leaves the index unchanged.
///
/// Implementations:
/// - `MockSearchIndex`: in-memory index with fail injection
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or fully replace a document by id.
    async fn upsert(&self, document: SearchDocument) -> Result<()>;

    /// Patch an existing document. Returns false when the document is absent;
    /// an absent document is never created from a partial update.
    async fn update_status(
        &self,
        owner: &Owner,
        id: &ApplicationId,
        patch: StatusPatch,
    ) -> Result<bool>;

    /// Remove a document by id. Returns whether it existed.
    async fn delete(&self, owner: &Owner, id: &ApplicationId) -> Result<bool>;

    /// Remove every document of an owner. Expensive on real indexes.
    async fn delete_by_owner(&self, owner: &Owner) -> Result<usize>;

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage>;
}
