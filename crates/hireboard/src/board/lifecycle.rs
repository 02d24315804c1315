use super::domain::{Application, ApplicationStatus, Job};
use super::ledger::{self, LedgerError};

/// Illegal application transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("application is already {}", .0.label())]
    AlreadyInStatus(ApplicationStatus),
    #[error("cannot move application from {} to {}", .from.label(), .to.label())]
    Unsupported {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Effect a transition had on the job's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEffect {
    Consumed,
    Released,
    Unchanged,
}

/// Move `application` to `target`, applying the matching ledger change to `job`.
///
/// The application is left untouched when an error is returned.
pub fn transition(
    job: &mut Job,
    application: &mut Application,
    target: ApplicationStatus,
) -> Result<SlotEffect, TransitionError> {
    use ApplicationStatus::{Accepted, Pending, Rejected};

    let from = application.status;
    if from == target {
        return Err(TransitionError::AlreadyInStatus(target));
    }

    let effect = match (from, target) {
        (Pending | Rejected, Accepted) => {
            ledger::increment(job)?;
            SlotEffect::Consumed
        }
        (Accepted, Rejected) => {
            ledger::decrement(job)?;
            SlotEffect::Released
        }
        (Pending, Rejected) => SlotEffect::Unchanged,
        (_, Pending) => return Err(TransitionError::Unsupported { from, to: target }),
        (Accepted, Accepted) | (Rejected, Rejected) => {
            return Err(TransitionError::AlreadyInStatus(target))
        }
    };

    application.status = target;
    Ok(effect)
}

/// Release the slot held by an application that is about to be deleted.
pub fn withdraw(job: &mut Job, application: &Application) -> Result<SlotEffect, TransitionError> {
    if application.status == ApplicationStatus::Accepted {
        ledger::decrement(job)?;
        Ok(SlotEffect::Released)
    } else {
        Ok(SlotEffect::Unchanged)
    }
}
