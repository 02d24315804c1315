use hireboard::board::{
    AccountRegistration, Actor, BoardError, InMemoryBoard, JobBoardService, Role,
};
use hireboard::config::BoardConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type BoardService = JobBoardService<InMemoryBoard>;

pub(crate) fn board_service(config: &BoardConfig) -> BoardService {
    JobBoardService::new(Arc::new(InMemoryBoard::new(config.lock_timeout)))
}

/// Accounts registered by `serve --seed` and by the demo.
pub(crate) struct SeededAccounts {
    pub(crate) employer: Actor,
    pub(crate) workers: Vec<Actor>,
}

const SEED_WORKERS: [(&str, &str); 3] = [
    ("Ravi Patil", "masonry"),
    ("Sunita Jadhav", "plastering"),
    ("Imran Shaikh", "carpentry"),
];

pub(crate) fn seed_accounts(service: &BoardService) -> Result<SeededAccounts, BoardError> {
    let employer = service
        .register_account(AccountRegistration {
            role: Role::Employer,
            full_name: "Asha Kulkarni".to_string(),
            city: Some("Pune".to_string()),
            company: Some("Kulkarni Builders".to_string()),
            skill: None,
        })?
        .actor();

    let workers = SEED_WORKERS
        .iter()
        .map(|(name, skill)| {
            service
                .register_account(AccountRegistration {
                    role: Role::Worker,
                    full_name: name.to_string(),
                    city: Some("Pune".to_string()),
                    company: None,
                    skill: Some(skill.to_string()),
                })
                .map(|account| account.actor())
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SeededAccounts { employer, workers })
}
