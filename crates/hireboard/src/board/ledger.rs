//! Slot ledger for a single job.
//!
//! `status` is never set directly: every function here leaves the job with
//! `0 <= filled_slots <= required_workers` and a status consistent with that count.

use super::domain::{Job, JobStatus};

/// Errors raised when a ledger mutation would break the slot invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("all {required} positions have been filled")]
    CapacityExceeded { required: u32 },
    #[error("no filled slot to release")]
    NothingToRelease,
    #[error("required workers ({requested}) cannot be lower than filled slots ({filled})")]
    BelowFilled { requested: u32, filled: u32 },
    #[error("required workers must be at least one")]
    ZeroCapacity,
}

/// Status implied by the current counts.
pub fn derived_status(required_workers: u32, filled_slots: u32) -> JobStatus {
    if filled_slots >= required_workers {
        JobStatus::Closed
    } else {
        JobStatus::Open
    }
}

/// Re-assert the cached status from the counts.
pub fn recompute(job: &mut Job) {
    job.status = derived_status(job.required_workers, job.filled_slots);
}

/// Consume one slot. Closes the job when the last slot is taken.
pub fn increment(job: &mut Job) -> Result<(), LedgerError> {
    if job.filled_slots >= job.required_workers {
        recompute(job);
        return Err(LedgerError::CapacityExceeded {
            required: job.required_workers,
        });
    }

    job.filled_slots += 1;
    recompute(job);
    Ok(())
}

/// Release one slot.
///
/// A released slot always reopens the job, whatever the reason it was closed for.
pub fn decrement(job: &mut Job) -> Result<(), LedgerError> {
    if job.filled_slots == 0 {
        return Err(LedgerError::NothingToRelease);
    }

    job.filled_slots -= 1;
    job.status = JobStatus::Open;
    Ok(())
}

/// Change the job's capacity, keeping already filled slots.
pub fn resize(job: &mut Job, required_workers: u32) -> Result<(), LedgerError> {
    if required_workers == 0 {
        return Err(LedgerError::ZeroCapacity);
    }
    if required_workers < job.filled_slots {
        return Err(LedgerError::BelowFilled {
            requested: required_workers,
            filled: job.filled_slots,
        });
    }

    job.required_workers = required_workers;
    recompute(job);
    Ok(())
}

/// Whether a new application can be taken right now.
pub fn accepts_applications(job: &Job) -> bool {
    job.status == JobStatus::Open && job.filled_slots < job.required_workers
}
