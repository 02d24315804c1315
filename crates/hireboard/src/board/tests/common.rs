use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::board::domain::{
    Account, AccountId, AccountRegistration, Actor, Application, ApplicationId,
    ApplicationStatus, Job, JobDraft, JobId, Role,
};
use crate::board::memory::{InMemoryBoard, MemoryJobUnit};
use crate::board::query::JobQuery;
use crate::board::repository::{BoardRepository, RepositoryError};
use crate::board::service::JobBoardService;

pub(super) struct Fixture {
    pub(super) service: JobBoardService<InMemoryBoard>,
    pub(super) board: Arc<InMemoryBoard>,
    pub(super) employer: Actor,
    pub(super) rival_employer: Actor,
    pub(super) admin: Actor,
    pub(super) workers: Vec<Actor>,
}

impl Fixture {
    pub(super) fn worker(&self, index: usize) -> Actor {
        self.workers[index]
    }

    pub(super) fn post_job(&self, required_workers: u32) -> Job {
        self.service
            .create_job(&self.employer, draft("Harvest crew", required_workers))
            .expect("employer can post")
    }

    pub(super) fn apply(&self, job: &Job, worker: usize) -> Application {
        self.service
            .apply_to_job(job.id, &self.worker(worker))
            .expect("worker can apply")
    }

    pub(super) fn accept(&self, application: &Application) -> Application {
        self.service
            .set_application_status(application.id, &self.employer, ApplicationStatus::Accepted)
            .expect("employer can accept")
    }

    pub(super) fn job(&self, job_id: JobId) -> Job {
        self.service.get_job(job_id).expect("job exists")
    }

    /// Committed `filled_slots` must equal the number of accepted applications.
    pub(super) fn assert_ledger_consistent(&self, job_id: JobId) {
        let job = self.job(job_id);
        let accepted = self
            .board
            .applications_for_job(job_id)
            .expect("applications readable")
            .into_iter()
            .filter(|application| application.status == ApplicationStatus::Accepted)
            .count();
        assert_eq!(job.filled_slots() as usize, accepted, "ledger drifted for {job_id}");
        assert!(job.filled_slots() <= job.required_workers());
    }
}

pub(super) fn fixture() -> Fixture {
    fixture_with_timeout(Duration::from_secs(2))
}

pub(super) fn fixture_with_timeout(lock_timeout: Duration) -> Fixture {
    let board = Arc::new(InMemoryBoard::new(lock_timeout));
    let service = JobBoardService::new(board.clone());

    let register = |role: Role, name: &str, city: &str| -> Actor {
        service
            .register_account(AccountRegistration {
                role,
                full_name: name.to_string(),
                city: Some(city.to_string()),
                company: None,
                skill: None,
            })
            .expect("registration succeeds")
            .actor()
    };

    let employer = register(Role::Employer, "Priya Farms", "Pune");
    let rival_employer = register(Role::Employer, "Coastal Builders", "Goa");
    let admin = register(Role::Admin, "Site Admin", "Pune");
    let workers = (0..4)
        .map(|index| register(Role::Worker, &format!("Worker {index}"), "Pune"))
        .collect();

    Fixture {
        service,
        board,
        employer,
        rival_employer,
        admin,
        workers,
    }
}

pub(super) fn draft(title: &str, required_workers: u32) -> JobDraft {
    JobDraft {
        title: title.to_string(),
        description: "Seasonal work, meals provided".to_string(),
        daily_wage_cents: 65_000,
        required_workers,
    }
}

/// Detached job with an arbitrary ledger, for pure ledger/lifecycle checks.
pub(super) fn job_with(required_workers: u32, filled_slots: u32) -> Job {
    let mut job = Job::posted(
        JobId(1),
        AccountId(1),
        draft("Ledger probe", required_workers),
        Utc::now(),
    );
    job.filled_slots = filled_slots;
    crate::board::ledger::recompute(&mut job);
    job
}

pub(super) fn application_with(status: ApplicationStatus) -> Application {
    let now = Utc::now();
    Application {
        id: ApplicationId(1),
        job_id: JobId(1),
        worker_id: AccountId(9),
        status,
        applied_at: now,
        updated_at: now,
    }
}

/// Store whose backend is permanently down.
pub(super) struct UnavailableBoard;

fn offline() -> RepositoryError {
    RepositoryError::Unavailable("database offline".to_string())
}

impl BoardRepository for UnavailableBoard {
    type Unit<'a> = MemoryJobUnit<'a>;

    fn insert_account(
        &self,
        _registration: AccountRegistration,
    ) -> Result<Account, RepositoryError> {
        Err(offline())
    }

    fn account(&self, id: AccountId) -> Result<Option<Account>, RepositoryError> {
        // Identity still resolves so requests reach the failing store.
        Ok(Some(Account {
            id,
            role: Role::Employer,
            full_name: "Offline Employer".to_string(),
            city: None,
            company: None,
            skill: None,
        }))
    }

    fn insert_job(
        &self,
        _employer_id: AccountId,
        _draft: JobDraft,
        _at: chrono::DateTime<Utc>,
    ) -> Result<Job, RepositoryError> {
        Err(offline())
    }

    fn job(&self, _id: JobId) -> Result<Option<Job>, RepositoryError> {
        Err(offline())
    }

    fn jobs(&self, _query: &JobQuery) -> Result<Vec<Job>, RepositoryError> {
        Err(offline())
    }

    fn application(&self, _id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Err(offline())
    }

    fn applications_for_job(&self, _job_id: JobId) -> Result<Vec<Application>, RepositoryError> {
        Err(offline())
    }

    fn applications_for_worker(
        &self,
        _worker_id: AccountId,
    ) -> Result<Vec<Application>, RepositoryError> {
        Err(offline())
    }

    fn lock_job(&self, _job_id: JobId) -> Result<MemoryJobUnit<'_>, RepositoryError> {
        Err(offline())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
