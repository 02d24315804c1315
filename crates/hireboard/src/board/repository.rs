use chrono::{DateTime, Utc};

use super::domain::{
    Account, AccountId, AccountRegistration, Application, ApplicationId, Job, JobDraft, JobId,
};
use super::query::JobQuery;

/// Storage abstraction so the service module can be exercised in isolation.
///
/// Reads outside of a unit of work see the latest committed state and are not ordered
/// with respect to concurrent writers.
pub trait BoardRepository: Send + Sync {
    type Unit<'a>: JobUnit
    where
        Self: 'a;

    fn insert_account(
        &self,
        registration: AccountRegistration,
    ) -> Result<Account, RepositoryError>;
    fn account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError>;

    fn insert_job(
        &self,
        employer_id: AccountId,
        draft: JobDraft,
        at: DateTime<Utc>,
    ) -> Result<Job, RepositoryError>;
    fn job(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;
    fn jobs(&self, query: &JobQuery) -> Result<Vec<Job>, RepositoryError>;

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn applications_for_job(&self, job_id: JobId) -> Result<Vec<Application>, RepositoryError>;
    fn applications_for_worker(
        &self,
        worker_id: AccountId,
    ) -> Result<Vec<Application>, RepositoryError>;

    /// Open a unit of work holding the exclusive lock on `job_id`.
    ///
    /// Blocks while another unit holds the same job and fails with
    /// [`RepositoryError::LockTimeout`] once the store's wait budget is spent. The job is
    /// read after the lock is taken; a missing job yields [`RepositoryError::NotFound`].
    fn lock_job(&self, job_id: JobId) -> Result<Self::Unit<'_>, RepositoryError>;
}

/// Writes against one locked job and its applications.
///
/// Changes are staged and become visible together on [`JobUnit::commit`]. Dropping a unit
/// without committing discards everything it staged.
pub trait JobUnit {
    fn job(&self) -> &Job;
    fn job_mut(&mut self) -> &mut Job;

    /// Application of this job by id; applications of other jobs are not visible.
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn application_of(&self, worker_id: AccountId)
        -> Result<Option<Application>, RepositoryError>;
    fn applications(&self) -> Result<Vec<Application>, RepositoryError>;

    /// Stage a new pending application. Fails with [`RepositoryError::Conflict`] when the
    /// worker already has one for this job.
    fn insert_application(
        &mut self,
        worker_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError>;
    fn update_application(&mut self, application: Application) -> Result<(), RepositoryError>;
    fn delete_application(&mut self, id: ApplicationId) -> Result<(), RepositoryError>;

    /// Stage removal of the job together with all of its applications.
    fn delete_job(&mut self);

    fn commit(self) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("timed out after {waited_ms}ms waiting for the lock on {job_id}")]
    LockTimeout { job_id: JobId, waited_ms: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
