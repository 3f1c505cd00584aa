//! Mock ApplicationStore implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::interfaces::application_store::{ApplicationStore, Result, StoreError};
use crate::model::{
    AnalyticsSnapshot, Application, ApplicationFields, ApplicationId, ApplicationStatus,
    CounterDelta, NewApplication, Owner, OwnerProfile,
};

/// Mock authoritative store keeping applications and profiles in memory.
#[derive(Default)]
pub struct MockApplicationStore {
    applications: RwLock<HashMap<Owner, HashMap<ApplicationId, Application>>>,
    profiles: RwLock<HashMap<Owner, OwnerProfile>>,
    fail_on_insert: RwLock<bool>,
    fail_on_update: RwLock<bool>,
    fail_on_remove: RwLock<bool>,
    fail_on_put: RwLock<bool>,
    fail_on_profile: RwLock<bool>,
}

impl MockApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_insert(&self, fail: bool) {
        *self.fail_on_insert.write().await = fail;
    }

    /// Fail `replace_fields` and `replace_status`.
    pub async fn set_fail_on_update(&self, fail: bool) {
        *self.fail_on_update.write().await = fail;
    }

    /// Fail `remove` and `remove_owner`.
    pub async fn set_fail_on_remove(&self, fail: bool) {
        *self.fail_on_remove.write().await = fail;
    }

    pub async fn set_fail_on_put(&self, fail: bool) {
        *self.fail_on_put.write().await = fail;
    }

    /// Fail counter updates and analytics merges.
    pub async fn set_fail_on_profile(&self, fail: bool) {
        *self.fail_on_profile.write().await = fail;
    }

    /// Snapshot of every application of an owner, sorted by id.
    pub async fn applications(&self, owner: &Owner) -> Vec<Application> {
        let mut apps: Vec<Application> = self
            .applications
            .read()
            .await
            .get(owner)
            .map(|apps| apps.values().cloned().collect())
            .unwrap_or_default();
        apps.sort_by(|a, b| a.id.cmp(&b.id));
        apps
    }

    async fn check(flag: &RwLock<bool>, op: &str) -> Result<()> {
        if *flag.read().await {
            return Err(StoreError::Unavailable(format!("{op} disabled")));
        }
        Ok(())
    }

    async fn update<F>(&self, owner: &Owner, id: &ApplicationId, f: F) -> Result<Application>
    where
        F: FnOnce(&mut Application) + Send,
    {
        Self::check(&self.fail_on_update, "update").await?;
        let mut store = self.applications.write().await;
        let app = store
            .get_mut(owner)
            .and_then(|apps| apps.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                owner: owner.clone(),
                id: id.clone(),
            })?;
        let previous = app.clone();
        f(app);
        Ok(previous)
    }
}

#[async_trait]
impl ApplicationStore for MockApplicationStore {
    async fn insert(&self, owner: &Owner, application: NewApplication) -> Result<Application> {
        Self::check(&self.fail_on_insert, "insert").await?;
        let app = Application::from_new(ApplicationId::generate(), owner.clone(), application);
        self.applications
            .write()
            .await
            .entry(owner.clone())
            .or_default()
            .insert(app.id.clone(), app.clone());
        Ok(app)
    }

    async fn get(&self, owner: &Owner, id: &ApplicationId) -> Result<Option<Application>> {
        let store = self.applications.read().await;
        Ok(store.get(owner).and_then(|apps| apps.get(id)).cloned())
    }

    async fn replace_fields(
        &self,
        owner: &Owner,
        id: &ApplicationId,
        fields: ApplicationFields,
    ) -> Result<Application> {
        self.update(owner, id, |app| app.fields = fields).await
    }

    async fn replace_status(
        &self,
        owner: &Owner,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application> {
        self.update(owner, id, |app| app.status = status).await
    }

    async fn remove(&self, owner: &Owner, id: &ApplicationId) -> Result<Option<Application>> {
        Self::check(&self.fail_on_remove, "remove").await?;
        let mut store = self.applications.write().await;
        Ok(store.get_mut(owner).and_then(|apps| apps.remove(id)))
    }

    async fn put(&self, application: Application) -> Result<()> {
        Self::check(&self.fail_on_put, "put").await?;
        self.applications
            .write()
            .await
            .entry(application.owner.clone())
            .or_default()
            .insert(application.id.clone(), application);
        Ok(())
    }

    async fn remove_owner(&self, owner: &Owner) -> Result<usize> {
        Self::check(&self.fail_on_remove, "remove_owner").await?;
        let removed = self
            .applications
            .write()
            .await
            .remove(owner)
            .map(|apps| apps.len())
            .unwrap_or(0);
        self.profiles.write().await.remove(owner);
        Ok(removed)
    }

    async fn count(&self, owner: &Owner) -> Result<usize> {
        let store = self.applications.read().await;
        Ok(store.get(owner).map(|apps| apps.len()).unwrap_or(0))
    }

    async fn profile(&self, owner: &Owner) -> Result<OwnerProfile> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(owner).cloned().unwrap_or_default())
    }

    async fn apply_counters(&self, owner: &Owner, deltas: &[CounterDelta]) -> Result<()> {
        Self::check(&self.fail_on_profile, "apply_counters").await?;
        let mut profiles = self.profiles.write().await;
        let profile = profiles.entry(owner.clone()).or_default();
        for delta in deltas {
            match delta {
                CounterDelta::Applications(n) => profile.applications_count += n,
                CounterDelta::Status(status, n) => {
                    *profile
                        .status_counts
                        .entry(status.counter_field().to_string())
                        .or_insert(0) += n;
                }
            }
        }
        Ok(())
    }

    async fn merge_analytics(&self, owner: &Owner, snapshot: &AnalyticsSnapshot) -> Result<()> {
        Self::check(&self.fail_on_profile, "merge_analytics").await?;
        let mut profiles = self.profiles.write().await;
        profiles.entry(owner.clone()).or_default().analytics = Some(snapshot.clone());
        Ok(())
    }
}
