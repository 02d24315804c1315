use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use super::domain::{
    Account, AccountId, AccountRegistration, Actor, Application, ApplicationId,
    ApplicationStatus, JobDraft, JobId, JobPatch, JobView,
};
use super::query::JobFilter;
use super::repository::BoardRepository;
use super::service::{BoardError, JobBoardService};

/// Header carrying the authenticated account id, set by the fronting auth layer.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Router builder exposing the job board endpoints.
pub fn board_router<R>(service: Arc<JobBoardService<R>>) -> Router
where
    R: BoardRepository + 'static,
{
    Router::new()
        .route("/api/v1/accounts", post(register_handler::<R>))
        .route(
            "/api/v1/jobs",
            get(list_jobs_handler::<R>).post(create_job_handler::<R>),
        )
        .route(
            "/api/v1/jobs/:job_id",
            get(get_job_handler::<R>)
                .patch(update_job_handler::<R>)
                .delete(delete_job_handler::<R>),
        )
        .route("/api/v1/jobs/:job_id/apply", post(apply_handler::<R>))
        .route(
            "/api/v1/jobs/:job_id/applications",
            get(job_applications_handler::<R>),
        )
        .route(
            "/api/v1/jobs/:job_id/applications/:worker_id",
            delete(remove_worker_handler::<R>),
        )
        .route(
            "/api/v1/applications/status",
            put(update_status_handler::<R>),
        )
        .route("/api/v1/applications/my", get(my_applications_handler::<R>))
        .with_state(service)
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusUpdateRequest {
    pub application_id: ApplicationId,
    pub status: ApplicationStatus,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub message: String,
    pub application: Application,
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = match &self {
            BoardError::NotFound { .. } => StatusCode::NOT_FOUND,
            BoardError::Forbidden { .. } => StatusCode::FORBIDDEN,
            BoardError::Unauthenticated => StatusCode::UNAUTHORIZED,
            BoardError::Conflict(_) => StatusCode::CONFLICT,
            BoardError::Closed
            | BoardError::AlreadyApplied
            | BoardError::CapacityExceeded
            | BoardError::InvalidState(_)
            | BoardError::Validation(_) => StatusCode::BAD_REQUEST,
            BoardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        match &self {
            BoardError::Internal(detail) => error!(%detail, "request failed"),
            BoardError::Conflict(source) => warn!(%source, "request hit a busy job"),
            _ => {}
        }

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
                "retryable": self.is_retryable(),
            }
        }));
        (status, body).into_response()
    }
}

fn actor_id(headers: &HeaderMap) -> Result<AccountId, BoardError> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(AccountId)
        .ok_or(BoardError::Unauthenticated)
}

impl From<JsonRejection> for BoardError {
    fn from(rejection: JsonRejection) -> Self {
        BoardError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for BoardError {
    fn from(rejection: QueryRejection) -> Self {
        BoardError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for BoardError {
    fn from(rejection: PathRejection) -> Self {
        BoardError::Validation(rejection.body_text())
    }
}

/// Resolve the caller and run `op` off the async workers.
///
/// Mutations may wait on a job lock, so they run on the blocking pool. A dropped request
/// does not cancel the spawned task, which always commits or rolls back in full.
async fn as_actor<R, T, F>(
    service: Arc<JobBoardService<R>>,
    headers: &HeaderMap,
    op: F,
) -> Result<T, BoardError>
where
    R: BoardRepository + 'static,
    T: Send + 'static,
    F: FnOnce(&JobBoardService<R>, Actor) -> Result<T, BoardError> + Send + 'static,
{
    let account_id = actor_id(headers)?;
    tokio::task::spawn_blocking(move || {
        let actor = service.resolve_actor(account_id)?;
        op(&service, actor)
    })
    .await
    .map_err(|join| BoardError::Internal(join.to_string()))?
}

pub(crate) async fn register_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    registration: Result<Json<AccountRegistration>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), BoardError>
where
    R: BoardRepository + 'static,
{
    let Json(registration) = registration?;
    let account = service.register_account(registration)?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub(crate) async fn list_jobs_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    filter: Result<Query<JobFilter>, QueryRejection>,
) -> Result<Json<Vec<JobView>>, BoardError>
where
    R: BoardRepository + 'static,
{
    let Query(filter) = filter?;
    let jobs = as_actor(service, &headers, move |service, actor| {
        service.list_jobs(&filter, &actor)
    })
    .await?;
    Ok(Json(jobs.iter().map(JobView::from).collect()))
}

pub(crate) async fn create_job_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    draft: Result<Json<JobDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<JobView>), BoardError>
where
    R: BoardRepository + 'static,
{
    let Json(draft) = draft?;
    let job = as_actor(service, &headers, move |service, actor| {
        service.create_job(&actor, draft)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(JobView::from(&job))))
}

pub(crate) async fn get_job_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    job_id: Result<Path<JobId>, PathRejection>,
) -> Result<Json<JobView>, BoardError>
where
    R: BoardRepository + 'static,
{
    let Path(job_id) = job_id?;
    let job = as_actor(service, &headers, move |service, _actor| {
        service.get_job(job_id)
    })
    .await?;
    Ok(Json(JobView::from(&job)))
}

pub(crate) async fn update_job_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    job_id: Result<Path<JobId>, PathRejection>,
    patch: Result<Json<JobPatch>, JsonRejection>,
) -> Result<Json<JobView>, BoardError>
where
    R: BoardRepository + 'static,
{
    let Path(job_id) = job_id?;
    let Json(patch) = patch?;
    let job = as_actor(service, &headers, move |service, actor| {
        service.update_job(job_id, &actor, patch)
    })
    .await?;
    Ok(Json(JobView::from(&job)))
}

pub(crate) async fn delete_job_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    job_id: Result<Path<JobId>, PathRejection>,
) -> Result<StatusCode, BoardError>
where
    R: BoardRepository + 'static,
{
    let Path(job_id) = job_id?;
    as_actor(service, &headers, move |service, actor| {
        service.delete_job(job_id, &actor)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn apply_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    job_id: Result<Path<JobId>, PathRejection>,
) -> Result<(StatusCode, Json<ApplicationResponse>), BoardError>
where
    R: BoardRepository + 'static,
{
    let Path(job_id) = job_id?;
    let application = as_actor(service, &headers, move |service, actor| {
        service.apply_to_job(job_id, &actor)
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse {
            message: "application submitted successfully".to_string(),
            application,
        }),
    ))
}

pub(crate) async fn job_applications_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    job_id: Result<Path<JobId>, PathRejection>,
) -> Result<Json<Vec<Application>>, BoardError>
where
    R: BoardRepository + 'static,
{
    let Path(job_id) = job_id?;
    let applications = as_actor(service, &headers, move |service, actor| {
        service.list_applications_for_job(job_id, &actor)
    })
    .await?;
    Ok(Json(applications))
}

pub(crate) async fn update_status_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    request: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<ApplicationResponse>, BoardError>
where
    R: BoardRepository + 'static,
{
    let Json(request) = request?;
    let application = as_actor(service, &headers, move |service, actor| {
        service.set_application_status(request.application_id, &actor, request.status)
    })
    .await?;
    Ok(Json(ApplicationResponse {
        message: format!("application {} successfully", request.status.label()),
        application,
    }))
}

pub(crate) async fn remove_worker_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
    ids: Result<Path<(JobId, AccountId)>, PathRejection>,
) -> Result<StatusCode, BoardError>
where
    R: BoardRepository + 'static,
{
    let Path((job_id, worker_id)) = ids?;
    as_actor(service, &headers, move |service, actor| {
        service.remove_application(job_id, worker_id, &actor)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn my_applications_handler<R>(
    State(service): State<Arc<JobBoardService<R>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Application>>, BoardError>
where
    R: BoardRepository + 'static,
{
    let applications = as_actor(service, &headers, move |service, actor| {
        service.list_my_applications(&actor)
    })
    .await?;
    Ok(Json(applications))
}
