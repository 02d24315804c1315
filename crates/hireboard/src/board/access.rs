use super::domain::{Actor, Job, Role};

/// Operations gated by role or job ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PostJob,
    EditJob,
    DeleteJob,
    Apply,
    ViewApplications,
    DecideApplication,
    RemoveApplication,
    ListOwnApplications,
}

impl Action {
    pub const fn label(self) -> &'static str {
        match self {
            Action::PostJob => "post jobs",
            Action::EditJob => "edit this job",
            Action::DeleteJob => "delete this job",
            Action::Apply => "apply for jobs",
            Action::ViewApplications => "view these applications",
            Action::DecideApplication => "modify this application",
            Action::RemoveApplication => "remove workers from this job",
            Action::ListOwnApplications => "list applications",
        }
    }
}

/// Capability check consulted before any mutation starts.
///
/// Job-scoped actions need the job the actor is acting on; without it they are denied.
pub fn actor_can(action: Action, actor: &Actor, job: Option<&Job>) -> bool {
    let owner_or_admin = || match job {
        Some(job) => {
            actor.has_role(Role::Admin) || (actor.has_role(Role::Employer) && actor.is_owner(job))
        }
        None => false,
    };

    match action {
        Action::PostJob => actor.has_role(Role::Employer),
        Action::Apply | Action::ListOwnApplications => actor.has_role(Role::Worker),
        Action::EditJob
        | Action::DeleteJob
        | Action::ViewApplications
        | Action::DecideApplication
        | Action::RemoveApplication => owner_or_admin(),
    }
}
