use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for posted jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

/// Identifier wrapper for registered accounts (workers, employers, admins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "application-{}", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Worker,
    Employer,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Worker => "worker",
            Role::Employer => "employer",
            Role::Admin => "admin",
        }
    }
}

/// Directory record for an identity known to the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub role: Role,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
}

impl Account {
    pub fn actor(&self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
        }
    }
}

/// Registration payload for a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRegistration {
    pub role: Role,
    pub full_name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub skill: Option<String>,
}

/// Authenticated identity performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: AccountId,
    pub role: Role,
}

impl Actor {
    pub const fn new(id: AccountId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }

    pub fn is_owner(&self, job: &Job) -> bool {
        job.employer_id == self.id
    }
}

/// Whether a job is taking new applications. Always a projection of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Closed,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Open => "open",
            JobStatus::Closed => "closed",
        }
    }
}

/// Posted job together with its slot ledger.
///
/// `filled_slots` and `status` are only changed through [`crate::board::ledger`], which
/// keeps `0 <= filled_slots <= required_workers` and re-derives `status` on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub employer_id: AccountId,
    pub title: String,
    pub description: String,
    pub daily_wage_cents: u64,
    pub(crate) required_workers: u32,
    pub(crate) filled_slots: u32,
    pub(crate) status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Fresh posting with an empty ledger.
    pub fn posted(id: JobId, employer_id: AccountId, draft: JobDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            employer_id,
            title: draft.title,
            description: draft.description,
            daily_wage_cents: draft.daily_wage_cents,
            required_workers: draft.required_workers,
            filled_slots: 0,
            status: JobStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn required_workers(&self) -> u32 {
        self.required_workers
    }

    pub fn filled_slots(&self) -> u32 {
        self.filled_slots
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn available_slots(&self) -> u32 {
        self.required_workers.saturating_sub(self.filled_slots)
    }

    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open
    }
}

/// Employer-supplied fields for a new job posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub daily_wage_cents: u64,
    pub required_workers: u32,
}

/// Partial update to a posted job. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub daily_wage_cents: Option<u64>,
    #[serde(default)]
    pub required_workers: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// A worker's application to one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub worker_id: AccountId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a job used by listings. Carries no applicant identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub employer_id: AccountId,
    pub title: String,
    pub description: String,
    pub daily_wage_cents: u64,
    pub required_workers: u32,
    pub filled_slots: u32,
    pub available_slots: u32,
    pub status: &'static str,
    pub created_at: DateTime<Utc>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            employer_id: job.employer_id,
            title: job.title.clone(),
            description: job.description.clone(),
            daily_wage_cents: job.daily_wage_cents,
            required_workers: job.required_workers,
            filled_slots: job.filled_slots,
            available_slots: job.available_slots(),
            status: job.status.label(),
            created_at: job.created_at,
        }
    }
}
