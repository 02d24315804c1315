use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use super::domain::{Account, AccountId, Actor, Application, Job, JobStatus, Role};

/// Listing filter as supplied by callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFilter {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub mine: bool,
}

impl JobFilter {
    /// Resolve the filter for `actor`. Only open jobs are listed unless a status is given,
    /// and the "mine" scope only applies to employers.
    pub fn scoped_to(&self, actor: &Actor) -> JobQuery {
        let city = self
            .city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
            .map(str::to_string);

        let employer_id = (self.mine && actor.has_role(Role::Employer)).then_some(actor.id);

        JobQuery {
            status: self.status.unwrap_or(JobStatus::Open),
            city,
            employer_id,
        }
    }
}

/// Fully resolved listing criteria handed to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQuery {
    pub status: JobStatus,
    pub city: Option<String>,
    pub employer_id: Option<AccountId>,
}

impl JobQuery {
    /// `employer` is the posting account, used for the city filter.
    pub fn matches(&self, job: &Job, employer: Option<&Account>) -> bool {
        if job.status() != self.status {
            return false;
        }
        if let Some(employer_id) = self.employer_id {
            if job.employer_id != employer_id {
                return false;
            }
        }
        match &self.city {
            Some(city) => employer
                .and_then(|account| account.city.as_deref())
                .is_some_and(|employer_city| employer_city == city),
            None => true,
        }
    }
}

pub fn newest_jobs_first(jobs: &mut [Job]) {
    jobs.sort_by_key(|job| Reverse((job.created_at, job.id)));
}

pub fn newest_applications_first(applications: &mut [Application]) {
    applications.sort_by_key(|application| Reverse((application.applied_at, application.id)));
}
