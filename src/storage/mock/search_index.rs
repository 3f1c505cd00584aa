//! Mock SearchIndex implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::interfaces::search_index::{
    Result, SearchDocument, SearchError, SearchIndex, SearchPage, SearchQuery, StatusPatch,
};
use crate::model::{ApplicationId, Owner};

/// Mock search index keeping documents in memory.
///
/// Free text matches case-insensitively against role, company and location.
/// Facets match case-insensitively. Hits are ordered by apply date, newest
/// first, then by id.
#[derive(Default)]
pub struct MockSearchIndex {
    documents: RwLock<HashMap<(Owner, ApplicationId), SearchDocument>>,
    fail_on_write: RwLock<bool>,
    fail_on_search: RwLock<bool>,
    bulk_deletes: RwLock<usize>,
}

impl MockSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    pub async fn set_fail_on_search(&self, fail: bool) {
        *self.fail_on_search.write().await = fail;
    }

    pub async fn document(&self, owner: &Owner, id: &ApplicationId) -> Option<SearchDocument> {
        let key = (owner.clone(), id.clone());
        self.documents.read().await.get(&key).cloned()
    }

    pub async fn document_count(&self, owner: &Owner) -> usize {
        let docs = self.documents.read().await;
        docs.keys().filter(|(o, _)| o == owner).count()
    }

    /// Number of `delete_by_owner` calls served.
    pub async fn bulk_delete_count(&self) -> usize {
        *self.bulk_deletes.read().await
    }

    async fn check_write(&self) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(SearchError::Unavailable("write disabled".to_string()));
        }
        Ok(())
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn matches(doc: &SearchDocument, query: &SearchQuery) -> bool {
    if doc.owner != query.owner {
        return false;
    }
    if let Some(text) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
        let text = text.trim();
        if !(contains_ci(&doc.role, text)
            || contains_ci(&doc.company, text)
            || contains_ci(&doc.location, text))
        {
            return false;
        }
    }
    let f = &query.filters;
    let facet = |value: &str, wanted: &Option<String>| {
        wanted
            .as_deref()
            .map(|w| value.eq_ignore_ascii_case(w))
            .unwrap_or(true)
    };
    facet(&doc.company, &f.company)
        && facet(&doc.role, &f.role)
        && facet(&doc.location, &f.location)
        && f.status.map(|s| s == doc.status).unwrap_or(true)
        && f.applied_from.map(|from| doc.applied_date >= from).unwrap_or(true)
        && f.applied_to.map(|to| doc.applied_date <= to).unwrap_or(true)
}

#[async_trait]
impl SearchIndex for MockSearchIndex {
    async fn upsert(&self, document: SearchDocument) -> Result<()> {
        self.check_write().await?;
        let key = (document.owner.clone(), document.object_id.clone());
        self.documents.write().await.insert(key, document);
        Ok(())
    }

    async fn update_status(
        &self,
        owner: &Owner,
        id: &ApplicationId,
        patch: StatusPatch,
    ) -> Result<bool> {
        self.check_write().await?;
        let key = (owner.clone(), id.clone());
        let mut docs = self.documents.write().await;
        let Some(doc) = docs.get_mut(&key) else {
            return Ok(false);
        };
        doc.status = patch.status;
        if let Some(applied_date) = patch.applied_date {
            doc.applied_date = applied_date;
        }
        Ok(true)
    }

    async fn delete(&self, owner: &Owner, id: &ApplicationId) -> Result<bool> {
        self.check_write().await?;
        let key = (owner.clone(), id.clone());
        Ok(self.documents.write().await.remove(&key).is_some())
    }

    async fn delete_by_owner(&self, owner: &Owner) -> Result<usize> {
        self.check_write().await?;
        let mut docs = self.documents.write().await;
        let before = docs.len();
        docs.retain(|(o, _), _| o != owner);
        *self.bulk_deletes.write().await += 1;
        Ok(before - docs.len())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        if *self.fail_on_search.read().await {
            return Err(SearchError::Unavailable("search disabled".to_string()));
        }
        if query.hits_per_page == 0 {
            return Err(SearchError::InvalidQuery(
                "hits_per_page must be positive".to_string(),
            ));
        }

        let docs = self.documents.read().await;
        let mut hits: Vec<SearchDocument> = docs
            .values()
            .filter(|doc| matches(doc, query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.applied_date
                .cmp(&a.applied_date)
                .then_with(|| a.object_id.cmp(&b.object_id))
        });

        let nb_hits = hits.len();
        let hits = hits
            .into_iter()
            .skip(query.page.saturating_mul(query.hits_per_page))
            .take(query.hits_per_page)
            .collect();
        Ok(SearchPage { hits, nb_hits })
    }
}
