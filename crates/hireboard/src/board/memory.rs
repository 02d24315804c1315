//! In-process [`BoardRepository`] used by the service binary, the demo, and tests.
//!
//! Committed rows live behind a single mutex. Job locks are tracked separately so a unit of
//! work can hold its job for the whole operation without blocking readers or units working
//! on other jobs.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::domain::{
    Account, AccountId, AccountRegistration, Application, ApplicationId, ApplicationStatus, Job,
    JobDraft, JobId,
};
use super::query::{newest_applications_first, newest_jobs_first, JobQuery};
use super::repository::{BoardRepository, JobUnit, RepositoryError};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    jobs: BTreeMap<JobId, Job>,
    applications: BTreeMap<ApplicationId, Application>,
    last_account: u64,
    last_job: u64,
    last_application: u64,
}

impl Tables {
    fn application_of(&self, job_id: JobId, worker_id: AccountId) -> Option<&Application> {
        self.applications.values().find(|application| {
            application.job_id == job_id && application.worker_id == worker_id
        })
    }
}

#[derive(Debug, Default)]
struct JobLocks {
    held: Mutex<HashSet<JobId>>,
    released: Condvar,
}

impl JobLocks {
    fn acquire(
        &self,
        job_id: JobId,
        timeout: Duration,
    ) -> Result<JobLockGuard<'_>, RepositoryError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut held = self.held.lock().map_err(|_| poisoned("job lock table"))?;

        while held.contains(&job_id) {
            let now = Instant::now();
            if now >= deadline {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                warn!(%job_id, waited_ms, "gave up waiting for job lock");
                return Err(RepositoryError::LockTimeout { job_id, waited_ms });
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| poisoned("job lock table"))?;
            held = guard;
        }

        held.insert(job_id);
        Ok(JobLockGuard {
            locks: self,
            job_id,
        })
    }
}

struct JobLockGuard<'a> {
    locks: &'a JobLocks,
    job_id: JobId,
}

impl Drop for JobLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = self
            .locks
            .held
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        held.remove(&self.job_id);
        drop(held);
        self.locks.released.notify_all();
    }
}

fn poisoned(what: &str) -> RepositoryError {
    RepositoryError::Unavailable(format!("{what} mutex poisoned"))
}

/// Thread-safe in-memory board store.
#[derive(Debug)]
pub struct InMemoryBoard {
    tables: Mutex<Tables>,
    locks: JobLocks,
    lock_timeout: Duration,
}

impl Default for InMemoryBoard {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryBoard {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            locks: JobLocks::default(),
            lock_timeout,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables.lock().map_err(|_| poisoned("board tables"))
    }
}

impl BoardRepository for InMemoryBoard {
    type Unit<'a> = MemoryJobUnit<'a>;

    fn insert_account(
        &self,
        registration: AccountRegistration,
    ) -> Result<Account, RepositoryError> {
        let mut tables = self.tables()?;
        tables.last_account += 1;
        let account = Account {
            id: AccountId(tables.last_account),
            role: registration.role,
            full_name: registration.full_name,
            city: registration.city,
            company: registration.company,
            skill: registration.skill,
        };
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        Ok(self.tables()?.accounts.get(&id).cloned())
    }

    fn insert_job(
        &self,
        employer_id: AccountId,
        draft: JobDraft,
        at: DateTime<Utc>,
    ) -> Result<Job, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.accounts.contains_key(&employer_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.last_job += 1;
        let job = Job::posted(JobId(tables.last_job), employer_id, draft, at);
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn job(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.tables()?.jobs.get(&id).cloned())
    }

    fn jobs(&self, query: &JobQuery) -> Result<Vec<Job>, RepositoryError> {
        let tables = self.tables()?;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| query.matches(job, tables.accounts.get(&job.employer_id)))
            .cloned()
            .collect();
        newest_jobs_first(&mut jobs);
        Ok(jobs)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.tables()?.applications.get(&id).cloned())
    }

    fn applications_for_job(&self, job_id: JobId) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let mut applications: Vec<Application> = tables
            .applications
            .values()
            .filter(|application| application.job_id == job_id)
            .cloned()
            .collect();
        newest_applications_first(&mut applications);
        Ok(applications)
    }

    fn applications_for_worker(
        &self,
        worker_id: AccountId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let mut applications: Vec<Application> = tables
            .applications
            .values()
            .filter(|application| application.worker_id == worker_id)
            .cloned()
            .collect();
        newest_applications_first(&mut applications);
        Ok(applications)
    }

    fn lock_job(&self, job_id: JobId) -> Result<MemoryJobUnit<'_>, RepositoryError> {
        let lock = self.locks.acquire(job_id, self.lock_timeout)?;
        let job = self
            .tables()?
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;

        Ok(MemoryJobUnit {
            board: self,
            job,
            job_deleted: false,
            staged: BTreeMap::new(),
            committed: false,
            _lock: lock,
        })
    }
}

/// Unit of work over one locked job. `None` in `staged` marks a deletion.
pub struct MemoryJobUnit<'a> {
    board: &'a InMemoryBoard,
    job: Job,
    job_deleted: bool,
    staged: BTreeMap<ApplicationId, Option<Application>>,
    committed: bool,
    _lock: JobLockGuard<'a>,
}

impl MemoryJobUnit<'_> {
    fn visible(&self, tables: &Tables) -> Vec<Application> {
        let mut applications: BTreeMap<ApplicationId, Application> = tables
            .applications
            .values()
            .filter(|application| application.job_id == self.job.id)
            .map(|application| (application.id, application.clone()))
            .collect();

        for (id, change) in &self.staged {
            match change {
                Some(application) => {
                    applications.insert(*id, application.clone());
                }
                None => {
                    applications.remove(id);
                }
            }
        }

        applications.into_values().collect()
    }
}

impl JobUnit for MemoryJobUnit<'_> {
    fn job(&self) -> &Job {
        &self.job
    }

    fn job_mut(&mut self) -> &mut Job {
        &mut self.job
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        if let Some(change) = self.staged.get(&id) {
            return Ok(change.clone());
        }
        let tables = self.board.tables()?;
        Ok(tables
            .applications
            .get(&id)
            .filter(|application| application.job_id == self.job.id)
            .cloned())
    }

    fn application_of(
        &self,
        worker_id: AccountId,
    ) -> Result<Option<Application>, RepositoryError> {
        let tables = self.board.tables()?;
        Ok(self
            .visible(&tables)
            .into_iter()
            .find(|application| application.worker_id == worker_id))
    }

    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.board.tables()?;
        let mut applications = self.visible(&tables);
        newest_applications_first(&mut applications);
        Ok(applications)
    }

    fn insert_application(
        &mut self,
        worker_id: AccountId,
        at: DateTime<Utc>,
    ) -> Result<Application, RepositoryError> {
        if self.application_of(worker_id)?.is_some() {
            return Err(RepositoryError::Conflict);
        }

        // Ids handed out here stay consumed even if the unit rolls back.
        let id = {
            let mut tables = self.board.tables()?;
            tables.last_application += 1;
            ApplicationId(tables.last_application)
        };

        let application = Application {
            id,
            job_id: self.job.id,
            worker_id,
            status: ApplicationStatus::Pending,
            applied_at: at,
            updated_at: at,
        };
        self.staged.insert(id, Some(application.clone()));
        Ok(application)
    }

    fn update_application(&mut self, application: Application) -> Result<(), RepositoryError> {
        if application.job_id != self.job.id || self.application(application.id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.staged.insert(application.id, Some(application));
        Ok(())
    }

    fn delete_application(&mut self, id: ApplicationId) -> Result<(), RepositoryError> {
        if self.application(id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.staged.insert(id, None);
        Ok(())
    }

    fn delete_job(&mut self) {
        self.job_deleted = true;
    }

    fn commit(mut self) -> Result<(), RepositoryError> {
        let mut tables = self.board.tables()?;
        let job_id = self.job.id;

        if self.job_deleted {
            tables.applications.retain(|_, application| application.job_id != job_id);
            tables.jobs.remove(&job_id);
            self.committed = true;
            return Ok(());
        }

        // Unique (job, worker) constraint, checked before anything is written.
        for (id, change) in &self.staged {
            if let Some(application) = change {
                let clash = tables
                    .application_of(job_id, application.worker_id)
                    .is_some_and(|existing| {
                        existing.id != *id && !self.staged.contains_key(&existing.id)
                    });
                if clash {
                    return Err(RepositoryError::Conflict);
                }
            }
        }
        if !tables.jobs.contains_key(&job_id) {
            return Err(RepositoryError::NotFound);
        }

        for (id, change) in std::mem::take(&mut self.staged) {
            match change {
                Some(application) => {
                    tables.applications.insert(id, application);
                }
                None => {
                    tables.applications.remove(&id);
                }
            }
        }
        tables.jobs.insert(job_id, self.job.clone());
        self.committed = true;
        Ok(())
    }
}

impl Drop for MemoryJobUnit<'_> {
    fn drop(&mut self) {
        if !self.committed && (!self.staged.is_empty() || self.job_deleted) {
            debug!(
                job_id = %self.job.id,
                staged = self.staged.len(),
                "discarding uncommitted changes"
            );
        }
    }
}
