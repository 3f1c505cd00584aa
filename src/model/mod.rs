//! Domain model.
//!
//! An [`Application`] belongs to exactly one [`Owner`] and lives in the
//! authoritative store. [`OwnerProfile`] holds the denormalized counters and
//! the analytics snapshot derived from the event log.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the account owning a set of applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    pub fn new(owner: impl Into<String>) -> Self {
        Self(owner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned to an application by the authoritative store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a status string is not one of the known variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid status: {0}")]
pub struct ParseStatusError(pub String);

/// Pipeline stage of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Applied,
    Screen,
    Interviewing,
    Offer,
    Rejected,
    Ghosted,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Screen,
        ApplicationStatus::Interviewing,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Ghosted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Screen => "Screen",
            ApplicationStatus::Interviewing => "Interviewing",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Ghosted => "Ghosted",
        }
    }

    /// Name of the per-status counter on the owner profile.
    pub fn counter_field(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied_count",
            ApplicationStatus::Screen => "screen_count",
            ApplicationStatus::Interviewing => "interviewing_count",
            ApplicationStatus::Offer => "offer_count",
            ApplicationStatus::Rejected => "rejected_count",
            ApplicationStatus::Ghosted => "ghosted_count",
        }
    }

    /// Screen or Interviewing.
    pub fn is_interview(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Screen | ApplicationStatus::Interviewing
        )
    }

    pub fn is_offer(&self) -> bool {
        matches!(self, ApplicationStatus::Offer)
    }

    /// Any status reached after hearing back (or not) from the employer.
    pub fn is_response(&self) -> bool {
        !matches!(self, ApplicationStatus::Applied)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

/// Editable descriptive fields of an application. Status is edited separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFields {
    pub role: String,
    pub company: String,
    pub location: String,
    /// Unix seconds.
    pub applied_date: i64,
    pub link: String,
}

/// An application as submitted for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    #[serde(flatten)]
    pub fields: ApplicationFields,
    pub status: ApplicationStatus,
}

/// An application record in the authoritative store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub owner: Owner,
    #[serde(flatten)]
    pub fields: ApplicationFields,
    pub status: ApplicationStatus,
}

impl Application {
    pub fn from_new(id: ApplicationId, owner: Owner, new: NewApplication) -> Self {
        Self {
            id,
            owner,
            fields: new.fields,
            status: new.status,
        }
    }
}

/// One month of the trailing twelve-month series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// `YYYY-MM`.
    pub month: String,
    pub applications: i64,
    pub interviews: i64,
    pub offers: i64,
}

/// Aggregates recomputed from the event log and merged into the owner profile.
///
/// Never a source of truth: it can always be rebuilt from events alone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// Applications sent in the current 30-day window.
    pub application_velocity: i64,
    pub application_velocity_trend: i64,
    /// Distinct jobs reaching an interview stage in the current window.
    pub resume_effectiveness: i64,
    pub resume_effectiveness_trend: i64,
    /// Distinct jobs reaching an offer in the current window.
    pub interview_effectiveness: i64,
    pub interview_effectiveness_trend: i64,
    /// Average days from apply date to first response, current window.
    pub avg_response_time: Option<f64>,
    pub avg_response_time_trend: Option<f64>,
    pub monthly_trends: Vec<MonthlyTrend>,
    /// Unix seconds at which the snapshot was computed.
    pub last_updated: i64,
}

/// Per-owner record in the authoritative store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OwnerProfile {
    pub applications_count: i64,
    /// Keyed by [`ApplicationStatus::counter_field`].
    pub status_counts: BTreeMap<String, i64>,
    pub analytics: Option<AnalyticsSnapshot>,
}

impl OwnerProfile {
    pub fn status_count(&self, status: ApplicationStatus) -> i64 {
        self.status_counts
            .get(status.counter_field())
            .copied()
            .unwrap_or(0)
    }
}

/// Increment applied to a denormalized profile counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterDelta {
    Applications(i64),
    Status(ApplicationStatus, i64),
}
