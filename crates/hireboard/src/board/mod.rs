//! Job postings, applications, and the slot ledger tying them together.

pub mod access;
pub mod domain;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use access::{actor_can, Action};
pub use domain::{
    Account, AccountId, AccountRegistration, Actor, Application, ApplicationId,
    ApplicationStatus, Job, JobDraft, JobId, JobPatch, JobStatus, JobView, Role,
};
pub use ledger::LedgerError;
pub use lifecycle::{SlotEffect, TransitionError};
pub use memory::InMemoryBoard;
pub use query::{JobFilter, JobQuery};
pub use repository::{BoardRepository, JobUnit, RepositoryError};
pub use router::{board_router, ACTOR_HEADER};
pub use service::{BoardError, JobBoardService};
