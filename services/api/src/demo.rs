use crate::infra::{board_service, seed_accounts, BoardService, SeededAccounts};
use clap::Args;
use hireboard::board::{ApplicationStatus, BoardError, Job, JobDraft};
use hireboard::config::BoardConfig;
use hireboard::error::AppError;
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// How long a mutation waits for a busy job before giving up (milliseconds)
    #[arg(long)]
    pub(crate) lock_timeout_ms: Option<u64>,
    /// Skip the concurrent last-slot race at the end of the walk-through
    #[arg(long)]
    pub(crate) skip_race: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        lock_timeout_ms,
        skip_race,
    } = args;

    let mut config = BoardConfig::default();
    if let Some(ms) = lock_timeout_ms.filter(|ms| *ms > 0) {
        config.lock_timeout = Duration::from_millis(ms);
    }

    let service = board_service(&config);
    let accounts = seed_accounts(&service)?;

    println!("Job board demo");
    staffing_walkthrough(&service, &accounts)?;
    removal_walkthrough(&service, &accounts)?;

    if !skip_race {
        last_slot_race(&service, &accounts)?;
    }
    Ok(())
}

fn post(
    service: &BoardService,
    accounts: &SeededAccounts,
    title: &str,
    slots: u32,
) -> Result<Job, BoardError> {
    service.create_job(
        &accounts.employer,
        JobDraft {
            title: title.to_string(),
            description: format!("{title}, daily wage paid at end of shift"),
            daily_wage_cents: 75_000,
            required_workers: slots,
        },
    )
}

fn print_ledger(service: &BoardService, job: &Job, step: &str) -> Result<(), BoardError> {
    let job = service.get_job(job.id)?;
    println!(
        "  {step:<40} filled {}/{} | available {} | {}",
        job.filled_slots(),
        job.required_workers(),
        job.available_slots(),
        job.status().label()
    );
    Ok(())
}

fn staffing_walkthrough(
    service: &BoardService,
    accounts: &SeededAccounts,
) -> Result<(), BoardError> {
    let employer = &accounts.employer;
    let workers = &accounts.workers;
    let job = post(service, accounts, "Slab casting", 2)?;
    println!("\nStaffing {} ({})", job.title, job.id);
    print_ledger(service, &job, "posted")?;

    let first = service.apply_to_job(job.id, &workers[0])?;
    print_ledger(service, &job, "worker 1 applied (pending)")?;
    service.set_application_status(first.id, employer, ApplicationStatus::Accepted)?;
    print_ledger(service, &job, "worker 1 accepted")?;

    let second = service.apply_to_job(job.id, &workers[1])?;
    service.set_application_status(second.id, employer, ApplicationStatus::Accepted)?;
    print_ledger(service, &job, "worker 2 accepted")?;

    match service.apply_to_job(job.id, &workers[2]) {
        Err(BoardError::Closed) => println!("  worker 3 turned away: job is closed"),
        Err(other) => return Err(other),
        Ok(application) => println!("  unexpected: {} was accepted", application.id),
    }

    service.set_application_status(first.id, employer, ApplicationStatus::Rejected)?;
    print_ledger(service, &job, "worker 1 rejected after acceptance")?;

    match service.apply_to_job(job.id, &workers[1]) {
        Err(BoardError::AlreadyApplied) => {
            println!("  worker 2 applied twice: refused as duplicate")
        }
        Err(other) => return Err(other),
        Ok(application) => println!("  unexpected: duplicate {} stored", application.id),
    }
    Ok(())
}

fn removal_walkthrough(
    service: &BoardService,
    accounts: &SeededAccounts,
) -> Result<(), BoardError> {
    let worker = &accounts.workers[2];
    let job = post(service, accounts, "Site watch", 1)?;
    println!("\nRemoving a hired worker from {} ({})", job.title, job.id);

    let application = service.apply_to_job(job.id, worker)?;
    service.set_application_status(
        application.id,
        &accounts.employer,
        ApplicationStatus::Accepted,
    )?;
    print_ledger(service, &job, "worker 3 accepted")?;

    service.remove_application(job.id, worker.id, &accounts.employer)?;
    print_ledger(service, &job, "worker 3 removed")?;
    let remaining = service.list_applications_for_job(job.id, &accounts.employer)?;
    println!("  applications left on job: {}", remaining.len());
    Ok(())
}

fn last_slot_race(service: &BoardService, accounts: &SeededAccounts) -> Result<(), BoardError> {
    let job = post(service, accounts, "Crane spotter", 1)?;
    println!(
        "\nTwo accepts racing for the last slot of {} ({})",
        job.title, job.id
    );

    let applications = accounts.workers[..2]
        .iter()
        .map(|worker| service.apply_to_job(job.id, worker))
        .collect::<Result<Vec<_>, _>>()?;

    let barrier = Barrier::new(applications.len());
    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = applications
            .iter()
            .map(|application| {
                let barrier = &barrier;
                let employer = accounts.employer;
                scope.spawn(move || {
                    barrier.wait();
                    let outcome = service.set_application_status(
                        application.id,
                        &employer,
                        ApplicationStatus::Accepted,
                    );
                    (application.id, outcome)
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join()).collect()
    });

    for outcome in outcomes {
        match outcome {
            Ok((application_id, Ok(_))) => println!("  {application_id}: accepted"),
            Ok((application_id, Err(err))) => {
                println!("  {application_id}: refused ({})", err.code())
            }
            Err(_) => return Err(BoardError::Internal("race worker panicked".to_string())),
        }
    }
    print_ledger(service, &job, "after race")
}
