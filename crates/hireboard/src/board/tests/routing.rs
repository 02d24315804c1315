use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::board::domain::{AccountId, Actor, ApplicationStatus, JobStatus, Role};
use crate::board::repository::BoardRepository;
use crate::board::router::{self, board_router, ACTOR_HEADER};
use crate::board::service::{BoardError, JobBoardService};

fn router_for(fx: &Fixture) -> Router {
    board_router(Arc::new(fx.service.clone()))
}

fn request(method: Method, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor.id.0.to_string());
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("route executes")
}

fn error_code(payload: &Value) -> Option<&str> {
    payload
        .get("error")
        .and_then(|error| error.get("code"))
        .and_then(Value::as_str)
}

#[tokio::test]
async fn register_route_creates_accounts() {
    let fx = fixture();
    let router = router_for(&fx);

    let response = send(
        &router,
        request(
            Method::POST,
            "/api/v1/accounts",
            None,
            Some(json!({ "role": "worker", "full_name": "Anil Kumar", "city": "Pune" })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("role"), Some(&json!("worker")));
    assert!(payload.get("id").and_then(Value::as_u64).is_some());
}

#[tokio::test]
async fn hiring_flow_over_http_tracks_slots() {
    let fx = fixture();
    let router = router_for(&fx);

    let response = send(
        &router,
        request(
            Method::POST,
            "/api/v1/jobs",
            Some(&fx.employer),
            Some(json!({
                "title": "Brick laying",
                "description": "Two week site job",
                "daily_wage_cents": 80000,
                "required_workers": 1
            })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let job = read_json_body(response).await;
    let job_id = job.get("id").and_then(Value::as_u64).expect("job id");
    assert_eq!(job.get("status"), Some(&json!("open")));

    let apply_uri = format!("/api/v1/jobs/{job_id}/apply");
    let response = send(
        &router,
        request(Method::POST, &apply_uri, Some(&fx.worker(0)), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    let application_id = payload
        .pointer("/application/id")
        .and_then(Value::as_u64)
        .expect("application id");

    let response = send(
        &router,
        request(Method::POST, &apply_uri, Some(&fx.worker(0)), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        error_code(&read_json_body(response).await),
        Some("already_applied")
    );

    let response = send(
        &router,
        request(
            Method::PUT,
            "/api/v1/applications/status",
            Some(&fx.employer),
            Some(json!({ "application_id": application_id, "status": "accepted" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload.pointer("/application/status"),
        Some(&json!("accepted"))
    );

    let response = send(
        &router,
        request(
            Method::GET,
            "/api/v1/jobs?status=closed",
            Some(&fx.worker(1)),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listing = read_json_body(response).await;
    let listed = listing
        .as_array()
        .and_then(|jobs| jobs.first())
        .expect("closed job listed");
    assert_eq!(listed.get("filled_slots"), Some(&json!(1)));
    assert_eq!(listed.get("available_slots"), Some(&json!(0)));
    assert!(listed.get("applications").is_none());
    assert!(!listing.to_string().contains("worker_id"));

    let remove_uri = format!("/api/v1/jobs/{job_id}/applications/{}", fx.worker(0).id.0);
    let response = send(
        &router,
        request(Method::DELETE, &remove_uri, Some(&fx.employer), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(
        &router,
        request(
            Method::GET,
            &format!("/api/v1/jobs/{job_id}"),
            Some(&fx.worker(1)),
            None,
        ),
    )
    .await;
    let job = read_json_body(response).await;
    assert_eq!(job.get("status"), Some(&json!("open")));
    assert_eq!(job.get("filled_slots"), Some(&json!(0)));
}

#[tokio::test]
async fn requests_without_known_actor_are_unauthorized() {
    let fx = fixture();
    let router = router_for(&fx);

    let response = send(&router, request(Method::GET, "/api/v1/jobs", None, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let stranger = Actor::new(AccountId(9_999), fx.employer.role);
    let response = send(
        &router,
        request(Method::GET, "/api/v1/jobs", Some(&stranger), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        error_code(&read_json_body(response).await),
        Some("unauthenticated")
    );
}

#[tokio::test]
async fn job_applications_route_is_owner_only() {
    let fx = fixture();
    let router = router_for(&fx);
    let job = fx.post_job(2);
    fx.apply(&job, 0);
    let uri = format!("/api/v1/jobs/{}/applications", job.id.0);

    let response = send(
        &router,
        request(Method::GET, &uri, Some(&fx.rival_employer), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&router, request(Method::GET, &uri, Some(&fx.employer), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn my_applications_route_lists_own_applications() {
    let fx = fixture();
    let router = router_for(&fx);
    let job = fx.post_job(2);
    fx.apply(&job, 0);
    fx.apply(&job, 1);

    let response = send(
        &router,
        request(
            Method::GET,
            "/api/v1/applications/my",
            Some(&fx.worker(1)),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let listed = payload.as_array().expect("array");
    assert_eq!(listed.len(), 1);
    assert_eq!(
        listed[0].get("worker_id").and_then(Value::as_u64),
        Some(fx.worker(1).id.0)
    );
}

#[tokio::test]
async fn apply_handler_reports_closed_jobs() {
    let fx = fixture();
    let job = fx.post_job(1);
    let application = fx.apply(&job, 0);
    fx.accept(&application);

    let mut headers = HeaderMap::new();
    headers.insert(
        ACTOR_HEADER,
        HeaderValue::from_str(&fx.worker(1).id.0.to_string()).expect("header"),
    );
    let result = router::apply_handler(
        State(Arc::new(fx.service.clone())),
        headers,
        Ok(Path(job.id)),
    )
    .await;

    match result {
        Err(BoardError::Closed) => {}
        Err(other) => panic!("expected closed, got {other:?}"),
        Ok(_) => panic!("expected closed, got success"),
    }
}

#[tokio::test]
async fn capacity_errors_map_to_bad_request() {
    let fx = fixture();
    let router = router_for(&fx);
    let job = fx.post_job(1);
    let first = fx.apply(&job, 0);
    let second = fx.apply(&job, 1);
    fx.accept(&first);

    let response = send(
        &router,
        request(
            Method::PUT,
            "/api/v1/applications/status",
            Some(&fx.employer),
            Some(json!({ "application_id": second.id.0, "status": "accepted" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert_eq!(error_code(&payload), Some("capacity_exceeded"));
    assert_eq!(payload.pointer("/error/retryable"), Some(&json!(false)));

    let stored = fx.job(job.id);
    assert_eq!(stored.filled_slots(), 1);
}

#[tokio::test]
async fn internal_errors_hide_details() {
    let service = Arc::new(JobBoardService::new(Arc::new(UnavailableBoard)));
    let router = board_router(service);
    let employer = Actor::new(AccountId(1), Role::Employer);

    let response = send(
        &router,
        request(Method::DELETE, "/api/v1/jobs/3", Some(&employer), None),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(error_code(&payload), Some("internal"));
    assert!(!payload.to_string().contains("offline"));
}

#[test]
fn error_responses_use_stable_status_codes() {
    let cases = [
        (BoardError::NotFound { entity: "job" }, StatusCode::NOT_FOUND),
        (BoardError::Closed, StatusCode::BAD_REQUEST),
        (BoardError::AlreadyApplied, StatusCode::BAD_REQUEST),
        (BoardError::Unauthenticated, StatusCode::UNAUTHORIZED),
        (
            BoardError::Conflict(crate::board::repository::RepositoryError::Conflict),
            StatusCode::CONFLICT,
        ),
    ];
    for (error, status) in cases {
        assert_eq!(error.into_response().status(), status);
    }
}

#[tokio::test]
async fn malformed_input_uses_error_body() {
    let fx = fixture();
    let router = router_for(&fx);
    let job = fx.post_job(1);
    let application = fx.apply(&job, 0);

    let requests = [
        request(
            Method::PUT,
            "/api/v1/applications/status",
            Some(&fx.employer),
            Some(json!({ "application_id": application.id.0, "status": "hired" })),
        ),
        request(
            Method::GET,
            "/api/v1/jobs?status=bogus",
            Some(&fx.worker(1)),
            None,
        ),
        request(Method::GET, "/api/v1/jobs/abc", Some(&fx.worker(1)), None),
        request(
            Method::DELETE,
            "/api/v1/jobs/1/applications/nobody",
            Some(&fx.employer),
            None,
        ),
    ];

    for request in requests {
        let uri = request.uri().to_string();
        let response = send(&router, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let payload = read_json_body(response).await;
        assert_eq!(error_code(&payload), Some("validation"), "{uri}");
        assert_eq!(payload.pointer("/error/retryable"), Some(&json!(false)));
    }
    assert_eq!(fx.job(job.id).filled_slots(), 0);
}

#[tokio::test]
async fn dropped_request_still_commits_in_full() {
    let fx = fixture();
    let router = router_for(&fx);
    let job = fx.post_job(1);
    let application = fx.apply(&job, 0);

    // Hold the job so the request parks inside its blocking task.
    let held = fx.board.lock_job(job.id).expect("lock");
    {
        let pending = send(
            &router,
            request(
                Method::PUT,
                "/api/v1/applications/status",
                Some(&fx.employer),
                Some(json!({ "application_id": application.id.0, "status": "accepted" })),
            ),
        );
        tokio::pin!(pending);
        for _ in 0..5 {
            tokio::select! {
                biased;
                _ = &mut pending => panic!("request finished while the job was held"),
                _ = tokio::task::yield_now() => {}
            }
        }
    }
    drop(held);

    let deadline = Instant::now() + Duration::from_secs(2);
    while fx.job(job.id).filled_slots() == 0 {
        assert!(Instant::now() < deadline, "abandoned accept never committed");
        tokio::task::yield_now().await;
        std::thread::sleep(Duration::from_millis(5));
    }

    let stored = fx
        .board
        .application(application.id)
        .expect("readable")
        .expect("application kept");
    assert_eq!(stored.status, ApplicationStatus::Accepted);
    assert_eq!(fx.job(job.id).status(), JobStatus::Closed);
    fx.assert_ledger_consistent(job.id);
}
