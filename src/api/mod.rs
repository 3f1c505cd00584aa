//! Request-level service facade.
//!
//! Every operation resolves the caller from a session token first and
//! validates its request before anything is written. Mutations then run
//! through the [`MutationCoordinator`]; a success means both the write and
//! its event publish went through.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinator::{
    AddApplication, DeleteApplication, EditApplication, EditStatus, MutationCoordinator,
};
use crate::dashboard::{Dashboard, DashboardPage, DashboardQuery};
use crate::error::{Error, Result};
use crate::events::{noon_of, EventRow};
use crate::interfaces::{SessionVerifier, Warehouse};
use crate::model::{
    Application, ApplicationFields, ApplicationId, ApplicationStatus, NewApplication, Owner,
    OwnerProfile,
};
use crate::revert::RevertResolver;

/// Descriptive fields as submitted by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplicationForm {
    pub role: String,
    pub company: String,
    pub location: String,
    /// Unix seconds; any time of day, stored as noon UTC of that day.
    pub applied_date: i64,
    pub link: String,
}

impl ApplicationForm {
    fn validate(self) -> Result<ApplicationFields> {
        let role = self.role.trim();
        let company = self.company.trim();
        if role.is_empty() {
            return Err(Error::Validation("role is required".to_string()));
        }
        if company.is_empty() {
            return Err(Error::Validation("company is required".to_string()));
        }
        if self.applied_date <= 0 {
            return Err(Error::Validation(
                "appliedDate must be a positive unix timestamp".to_string(),
            ));
        }
        Ok(ApplicationFields {
            role: role.to_string(),
            company: company.to_string(),
            location: self.location.trim().to_string(),
            applied_date: noon_of(self.applied_date),
            link: self.link.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddApplicationRequest {
    #[serde(flatten)]
    pub form: ApplicationForm,
    /// Defaults to `Applied`.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditApplicationRequest {
    #[serde(rename = "objectID")]
    pub id: ApplicationId,
    #[serde(flatten)]
    pub form: ApplicationForm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditStatusRequest {
    #[serde(rename = "objectID")]
    pub id: ApplicationId,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevertStatusRequest {
    #[serde(rename = "objectID")]
    pub id: ApplicationId,
    #[serde(rename = "operationID")]
    pub operation_id: Uuid,
}

fn parse_status(status: &str) -> Result<ApplicationStatus> {
    status
        .trim()
        .parse::<ApplicationStatus>()
        .map_err(|e| Error::Validation(e.to_string()))
}

fn require_id(id: &ApplicationId) -> Result<()> {
    if id.as_str().trim().is_empty() {
        return Err(Error::Validation("objectID is required".to_string()));
    }
    Ok(())
}

/// Owner-scoped operations on job applications.
pub struct UserService {
    verifier: Arc<dyn SessionVerifier>,
    coordinator: Arc<MutationCoordinator>,
    resolver: RevertResolver,
    warehouse: Arc<dyn Warehouse>,
    dashboard: Dashboard,
}

impl UserService {
    pub fn new(
        verifier: Arc<dyn SessionVerifier>,
        coordinator: Arc<MutationCoordinator>,
        warehouse: Arc<dyn Warehouse>,
        dashboard: Dashboard,
    ) -> Self {
        Self {
            verifier,
            resolver: RevertResolver::new(coordinator.clone(), warehouse.clone()),
            coordinator,
            warehouse,
            dashboard,
        }
    }

    fn owner(&self, token: &str) -> Result<Owner> {
        Ok(self.verifier.verify(token)?)
    }

    pub async fn add_application(
        &self,
        token: &str,
        request: AddApplicationRequest,
    ) -> Result<Application> {
        let owner = self.owner(token)?;
        let status = match request.status.as_deref() {
            Some(status) => parse_status(status)?,
            None => ApplicationStatus::Applied,
        };
        let fields = request.form.validate()?;
        self.coordinator
            .perform(AddApplication {
                owner,
                application: NewApplication { fields, status },
            })
            .await
    }

    pub async fn edit_application(
        &self,
        token: &str,
        request: EditApplicationRequest,
    ) -> Result<Application> {
        let owner = self.owner(token)?;
        require_id(&request.id)?;
        let fields = request.form.validate()?;
        self.coordinator
            .perform(EditApplication {
                owner,
                id: request.id,
                fields,
            })
            .await
    }

    pub async fn edit_status(&self, token: &str, request: EditStatusRequest) -> Result<Application> {
        let owner = self.owner(token)?;
        require_id(&request.id)?;
        let status = parse_status(&request.status)?;
        self.coordinator
            .perform(EditStatus {
                owner,
                id: request.id,
                status,
            })
            .await
    }

    /// Returns whether the application existed.
    pub async fn delete_application(&self, token: &str, id: ApplicationId) -> Result<bool> {
        let owner = self.owner(token)?;
        require_id(&id)?;
        let removed = self
            .coordinator
            .perform(DeleteApplication { owner, id })
            .await?;
        Ok(removed.is_some())
    }

    /// Delete every application of the caller. Returns how many were removed.
    pub async fn delete_user(&self, token: &str) -> Result<usize> {
        let owner = self.owner(token)?;
        let removed = self.coordinator.delete_user(&owner).await?;
        self.dashboard.forget(&owner).await;
        Ok(removed)
    }

    pub async fn revert_status(
        &self,
        token: &str,
        request: RevertStatusRequest,
    ) -> Result<ApplicationStatus> {
        let owner = self.owner(token)?;
        require_id(&request.id)?;
        self.resolver
            .revert(&owner, &request.id, request.operation_id)
            .await
    }

    /// Every recorded event of a job, newest first, reverted ones included.
    pub async fn timeline(&self, token: &str, id: ApplicationId) -> Result<Vec<EventRow>> {
        let owner = self.owner(token)?;
        require_id(&id)?;
        Ok(self.warehouse.job_events(&owner, &id).await?)
    }

    pub async fn profile(&self, token: &str) -> Result<OwnerProfile> {
        let owner = self.owner(token)?;
        Ok(self.coordinator.store().profile(&owner).await?)
    }

    pub async fn dashboard(&self, token: &str, query: &DashboardQuery) -> Result<DashboardPage> {
        let owner = self.owner(token)?;
        self.dashboard.query(&owner, query).await
    }
}
