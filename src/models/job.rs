//! # Job Types
//!
//! Jobs and job applications, with their lifecycles.
//!
//! ## Job Status Flow
//!
//! ```text
//! open ──(application accepted)──> in_progress ──(owner completes)──> completed
//!   └──────────────(owner cancels)────────┴──> cancelled
//! ```
//!
//! Applications go `pending -> accepted | rejected` exactly once.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{InvalidTransition, UserPublicProfile, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobCategory {
    Mowing,
    Weeding,
    LeafRemoval,
    Trimming,
    Cleanup,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status_str = match self {
            JobStatus::Open => "open",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{status_str}")
    }
}

impl JobStatus {
    /// Returns true if the owner may still edit or delete the job.
    #[inline]
    pub fn is_editable(&self) -> bool {
        matches!(self, JobStatus::Open)
    }

    /// Returns true if new applications are accepted.
    #[inline]
    pub fn accepts_applications(&self) -> bool {
        matches!(self, JobStatus::Open)
    }

    /// Status after one of the job's applications is accepted.
    ///
    /// A job already in progress stays in progress, so accepting a second
    /// applicant is not an error.
    pub fn on_application_accepted(self) -> Result<JobStatus, InvalidTransition> {
        match self {
            JobStatus::Open | JobStatus::InProgress => Ok(JobStatus::InProgress),
            JobStatus::Completed | JobStatus::Cancelled => Err(InvalidTransition(
                "cannot accept applications for a job that is completed or cancelled",
            )),
        }
    }

    pub fn complete(self) -> Result<JobStatus, InvalidTransition> {
        match self {
            JobStatus::InProgress => Ok(JobStatus::Completed),
            _ => Err(InvalidTransition("job must be in progress to complete")),
        }
    }

    pub fn cancel(self) -> Result<JobStatus, InvalidTransition> {
        match self {
            JobStatus::Open | JobStatus::InProgress => Ok(JobStatus::Cancelled),
            _ => Err(InvalidTransition(
                "only open or in progress jobs can be cancelled",
            )),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub special_notes: String,
    pub category: JobCategory,
    pub fixed_price: f64,
    pub estimated_hours: f64,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zip_code: String,
    pub elementary_school_district_name: String,
    pub visibility: Visibility,
    pub status: JobStatus,
    pub scheduled_date: Option<OffsetDateTime>,
    pub completion_image_urls: Json<Vec<String>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub special_notes: String,
    pub category: JobCategory,
    pub fixed_price: f64,
    pub estimated_hours: f64,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub zip_code: String,
    pub elementary_school_district_name: String,
    pub visibility: Visibility,
    pub status: JobStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub scheduled_date: Option<OffsetDateTime>,
    pub completion_image_urls: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user: Option<UserPublicProfile>,
}

impl Job {
    pub fn into_response(self, owner: Option<UserPublicProfile>) -> JobResponse {
        JobResponse {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            special_notes: self.special_notes,
            category: self.category,
            fixed_price: self.fixed_price,
            estimated_hours: self.estimated_hours,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            zip_code: self.zip_code,
            elementary_school_district_name: self.elementary_school_district_name,
            visibility: self.visibility,
            status: self.status,
            scheduled_date: self.scheduled_date,
            completion_image_urls: self.completion_image_urls.0,
            created_at: self.created_at,
            updated_at: self.updated_at,
            user: owner,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    /// Decides a pending application. Decisions are final.
    pub fn decide(self, decision: ApplicationStatus) -> Result<ApplicationStatus, InvalidTransition> {
        match (self, decision) {
            (ApplicationStatus::Pending, ApplicationStatus::Pending) => Err(InvalidTransition(
                "application status must be accepted or rejected",
            )),
            (ApplicationStatus::Pending, decided) => Ok(decided),
            _ => Err(InvalidTransition("application has already been processed")),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobApplication {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub applied_at: OffsetDateTime,
    pub status: ApplicationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobApplicationResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
    pub status: ApplicationStatus,
    pub applicant: Option<UserPublicProfile>,
}

impl JobApplication {
    pub fn into_response(self, applicant: Option<UserPublicProfile>) -> JobApplicationResponse {
        JobApplicationResponse {
            id: self.id,
            job_id: self.job_id,
            user_id: self.user_id,
            message: self.message,
            applied_at: self.applied_at,
            status: self.status,
            applicant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepting_moves_open_job_into_progress() {
        assert_eq!(
            JobStatus::Open.on_application_accepted(),
            Ok(JobStatus::InProgress)
        );
    }

    #[test]
    fn second_acceptance_leaves_job_in_progress() {
        assert_eq!(
            JobStatus::InProgress.on_application_accepted(),
            Ok(JobStatus::InProgress)
        );
    }

    #[test]
    fn finished_jobs_reject_acceptance() {
        assert!(JobStatus::Completed.on_application_accepted().is_err());
        assert!(JobStatus::Cancelled.on_application_accepted().is_err());
    }

    #[test]
    fn completion_requires_in_progress() {
        assert_eq!(JobStatus::InProgress.complete(), Ok(JobStatus::Completed));
        for status in [JobStatus::Open, JobStatus::Completed, JobStatus::Cancelled] {
            assert_eq!(
                status.complete(),
                Err(InvalidTransition("job must be in progress to complete"))
            );
        }
    }

    #[test]
    fn cancel_only_from_active_states() {
        assert_eq!(JobStatus::Open.cancel(), Ok(JobStatus::Cancelled));
        assert_eq!(JobStatus::InProgress.cancel(), Ok(JobStatus::Cancelled));
        assert!(JobStatus::Completed.cancel().is_err());
        assert!(JobStatus::Cancelled.cancel().is_err());
    }

    #[test]
    fn only_open_jobs_are_editable() {
        assert!(JobStatus::Open.is_editable());
        assert!(!JobStatus::InProgress.is_editable());
        assert!(!JobStatus::Completed.is_editable());
    }

    #[test]
    fn application_decisions_are_final() {
        assert_eq!(
            ApplicationStatus::Pending.decide(ApplicationStatus::Accepted),
            Ok(ApplicationStatus::Accepted)
        );
        assert_eq!(
            ApplicationStatus::Pending.decide(ApplicationStatus::Rejected),
            Ok(ApplicationStatus::Rejected)
        );
        assert!(
            ApplicationStatus::Pending
                .decide(ApplicationStatus::Pending)
                .is_err()
        );
        assert!(
            ApplicationStatus::Accepted
                .decide(ApplicationStatus::Rejected)
                .is_err()
        );
    }
}
