use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::access::{actor_can, Action};
use super::domain::{
    Account, AccountId, AccountRegistration, Actor, Application, ApplicationId,
    ApplicationStatus, Job, JobDraft, JobId, JobPatch,
};
use super::ledger::{self, LedgerError};
use super::lifecycle::{self, TransitionError};
use super::query::JobFilter;
use super::repository::{BoardRepository, JobUnit, RepositoryError};

/// Service composing the repository, ledger, and application lifecycle.
///
/// Every mutation of a job's ledger runs inside a unit of work holding that job's lock:
/// the job is re-read under the lock, preconditions are checked against that read, and
/// the job and its applications are committed together or not at all.
pub struct JobBoardService<R> {
    repository: Arc<R>,
}

impl<R> Clone for JobBoardService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R> JobBoardService<R>
where
    R: BoardRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn register_account(
        &self,
        registration: AccountRegistration,
    ) -> Result<Account, BoardError> {
        if registration.full_name.trim().is_empty() {
            return Err(BoardError::Validation("full name is required".to_string()));
        }
        let account = self.repository.insert_account(registration)?;
        info!(account_id = %account.id, role = account.role.label(), "account registered");
        Ok(account)
    }

    /// Identity lookup for transports that only carry an account id.
    pub fn resolve_actor(&self, account_id: AccountId) -> Result<Actor, BoardError> {
        self.repository
            .account(account_id)?
            .map(|account| account.actor())
            .ok_or(BoardError::Unauthenticated)
    }

    pub fn create_job(&self, actor: &Actor, draft: JobDraft) -> Result<Job, BoardError> {
        ensure(actor_can(Action::PostJob, actor, None), Action::PostJob)?;
        if draft.title.trim().is_empty() {
            return Err(BoardError::Validation("title is required".to_string()));
        }
        if draft.required_workers == 0 {
            return Err(BoardError::Validation(
                "required workers must be at least one".to_string(),
            ));
        }

        let job = self.repository.insert_job(actor.id, draft, Utc::now())?;
        info!(
            job_id = %job.id,
            employer_id = %actor.id,
            required_workers = job.required_workers(),
            "job posted"
        );
        Ok(job)
    }

    pub fn get_job(&self, job_id: JobId) -> Result<Job, BoardError> {
        self.repository
            .job(job_id)?
            .ok_or(BoardError::NotFound { entity: "job" })
    }

    pub fn update_job(
        &self,
        job_id: JobId,
        actor: &Actor,
        patch: JobPatch,
    ) -> Result<Job, BoardError> {
        let mut unit = self.lock(job_id)?;
        ensure(
            actor_can(Action::EditJob, actor, Some(unit.job())),
            Action::EditJob,
        )?;

        let job = unit.job_mut();
        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(BoardError::Validation("title is required".to_string()));
            }
            job.title = title;
        }
        if let Some(description) = patch.description {
            job.description = description;
        }
        if let Some(wage) = patch.daily_wage_cents {
            job.daily_wage_cents = wage;
        }
        if let Some(required_workers) = patch.required_workers {
            ledger::resize(job, required_workers)?;
        }
        job.updated_at = Utc::now();

        let updated = job.clone();
        unit.commit()?;
        info!(job_id = %updated.id, status = updated.status().label(), "job updated");
        Ok(updated)
    }

    /// Delete a job together with all of its applications.
    pub fn delete_job(&self, job_id: JobId, actor: &Actor) -> Result<(), BoardError> {
        let mut unit = self.lock(job_id)?;
        ensure(
            actor_can(Action::DeleteJob, actor, Some(unit.job())),
            Action::DeleteJob,
        )?;

        let released = unit.job().filled_slots();
        unit.delete_job();
        unit.commit()?;
        info!(%job_id, released_slots = released, "job deleted");
        Ok(())
    }

    /// Submit a pending application. No slot is consumed until the employer accepts it.
    pub fn apply_to_job(&self, job_id: JobId, actor: &Actor) -> Result<Application, BoardError> {
        ensure(actor_can(Action::Apply, actor, None), Action::Apply)?;

        let mut unit = self.lock(job_id)?;
        if !unit.job().is_open() {
            debug!(%job_id, worker_id = %actor.id, "application refused: job closed");
            return Err(BoardError::Closed);
        }
        if !ledger::accepts_applications(unit.job()) {
            // Stale open flag on a full job: re-assert it before refusing.
            ledger::recompute(unit.job_mut());
            unit.commit()?;
            return Err(BoardError::Closed);
        }
        if unit.application_of(actor.id)?.is_some() {
            debug!(%job_id, worker_id = %actor.id, "application refused: duplicate");
            return Err(BoardError::AlreadyApplied);
        }

        let application = match unit.insert_application(actor.id, Utc::now()) {
            Err(RepositoryError::Conflict) => return Err(BoardError::AlreadyApplied),
            other => other?,
        };
        match unit.commit() {
            Err(RepositoryError::Conflict) => return Err(BoardError::AlreadyApplied),
            other => other?,
        }

        info!(
            %job_id,
            application_id = %application.id,
            worker_id = %actor.id,
            "application submitted"
        );
        Ok(application)
    }

    /// Accept or reject an application, moving the job's ledger accordingly.
    pub fn set_application_status(
        &self,
        application_id: ApplicationId,
        actor: &Actor,
        status: ApplicationStatus,
    ) -> Result<Application, BoardError> {
        if status == ApplicationStatus::Pending {
            return Err(BoardError::InvalidState(
                "status must be accepted or rejected".to_string(),
            ));
        }

        // Only used to find the job to lock; everything is re-read under the lock.
        let snapshot = self
            .repository
            .application(application_id)?
            .ok_or(BoardError::NotFound {
                entity: "application",
            })?;

        let mut unit = self.lock(snapshot.job_id)?;
        let mut application = unit
            .application(application_id)?
            .ok_or(BoardError::NotFound {
                entity: "application",
            })?;
        ensure(
            actor_can(Action::DecideApplication, actor, Some(unit.job())),
            Action::DecideApplication,
        )?;

        lifecycle::transition(unit.job_mut(), &mut application, status)?;
        let now = Utc::now();
        application.updated_at = now;
        unit.job_mut().updated_at = now;
        unit.update_application(application.clone())?;

        let job = unit.job().clone();
        unit.commit()?;

        info!(
            job_id = %job.id,
            %application_id,
            status = status.label(),
            filled_slots = job.filled_slots(),
            job_status = job.status().label(),
            "application status updated"
        );
        Ok(application)
    }

    /// Remove a worker's application from a job, releasing its slot if it held one.
    pub fn remove_application(
        &self,
        job_id: JobId,
        worker_id: AccountId,
        actor: &Actor,
    ) -> Result<(), BoardError> {
        let mut unit = self.lock(job_id)?;
        ensure(
            actor_can(Action::RemoveApplication, actor, Some(unit.job())),
            Action::RemoveApplication,
        )?;

        let application = unit
            .application_of(worker_id)?
            .ok_or(BoardError::NotFound {
                entity: "application",
            })?;

        lifecycle::withdraw(unit.job_mut(), &application)?;
        unit.job_mut().updated_at = Utc::now();
        unit.delete_application(application.id)?;

        let job = unit.job().clone();
        unit.commit()?;

        info!(
            %job_id,
            %worker_id,
            application_id = %application.id,
            filled_slots = job.filled_slots(),
            job_status = job.status().label(),
            "worker removed from job"
        );
        Ok(())
    }

    pub fn list_jobs(&self, filter: &JobFilter, actor: &Actor) -> Result<Vec<Job>, BoardError> {
        let query = filter.scoped_to(actor);
        Ok(self.repository.jobs(&query)?)
    }

    pub fn list_applications_for_job(
        &self,
        job_id: JobId,
        actor: &Actor,
    ) -> Result<Vec<Application>, BoardError> {
        let job = self.get_job(job_id)?;
        ensure(
            actor_can(Action::ViewApplications, actor, Some(&job)),
            Action::ViewApplications,
        )?;
        Ok(self.repository.applications_for_job(job_id)?)
    }

    pub fn list_my_applications(&self, actor: &Actor) -> Result<Vec<Application>, BoardError> {
        ensure(
            actor_can(Action::ListOwnApplications, actor, None),
            Action::ListOwnApplications,
        )?;
        Ok(self.repository.applications_for_worker(actor.id)?)
    }

    fn lock(&self, job_id: JobId) -> Result<R::Unit<'_>, BoardError> {
        self.repository.lock_job(job_id).map_err(|error| match error {
            RepositoryError::NotFound => BoardError::NotFound { entity: "job" },
            other => other.into(),
        })
    }
}

fn ensure(allowed: bool, action: Action) -> Result<(), BoardError> {
    if allowed {
        Ok(())
    } else {
        Err(BoardError::Forbidden { action })
    }
}

/// Error raised by the job board service.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("you do not have permission to {}", .action.label())]
    Forbidden { action: Action },
    #[error("this job is no longer accepting applications")]
    Closed,
    #[error("you have already applied for this job")]
    AlreadyApplied,
    #[error("all positions have been filled")]
    CapacityExceeded,
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Validation(String),
    #[error("missing or unknown actor")]
    Unauthenticated,
    #[error("the job is busy, retry the request")]
    Conflict(#[source] RepositoryError),
    /// Detail is kept for logs only; it is never shown to callers.
    #[error("internal error")]
    Internal(String),
}

impl BoardError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            BoardError::NotFound { .. } => "not_found",
            BoardError::Forbidden { .. } => "forbidden",
            BoardError::Closed => "closed",
            BoardError::AlreadyApplied => "already_applied",
            BoardError::CapacityExceeded => "capacity_exceeded",
            BoardError::InvalidState(_) => "invalid_state",
            BoardError::Validation(_) => "validation",
            BoardError::Unauthenticated => "unauthenticated",
            BoardError::Conflict(_) => "conflict",
            BoardError::Internal(_) => "internal",
        }
    }

    /// Whether the whole operation may be retried from the start.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, BoardError::Conflict(_))
    }
}

impl From<RepositoryError> for BoardError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => BoardError::NotFound { entity: "record" },
            RepositoryError::Unavailable(detail) => BoardError::Internal(detail),
            retryable @ (RepositoryError::LockTimeout { .. } | RepositoryError::Conflict) => {
                BoardError::Conflict(retryable)
            }
        }
    }
}

impl From<LedgerError> for BoardError {
    fn from(error: LedgerError) -> Self {
        match error {
            LedgerError::CapacityExceeded { .. } => BoardError::CapacityExceeded,
            LedgerError::ZeroCapacity => BoardError::Validation(error.to_string()),
            LedgerError::NothingToRelease | LedgerError::BelowFilled { .. } => {
                BoardError::InvalidState(error.to_string())
            }
        }
    }
}

impl From<TransitionError> for BoardError {
    fn from(error: TransitionError) -> Self {
        match error {
            TransitionError::Ledger(inner) => inner.into(),
            TransitionError::AlreadyInStatus(_) | TransitionError::Unsupported { .. } => {
                BoardError::InvalidState(error.to_string())
            }
        }
    }
}
