//! Route handlers: one per §6 external interface operation.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use broker_types::{JobStatus, Task, Template, WorkerObservationView, WorkerStatus};
use tower_http::trace::TraceLayer;

use super::error::{not_found, ApiError};
use super::state::AppState;
use crate::time::now_millis;

/// Builds the full router: every HTTP surface operation, plus `/healthz`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/enqueue/regional", post(enqueue_regional))
        .route("/dequeue/regional", post(dequeue_regional))
        .route("/complete/{job_id}/{task_index}", post(complete_task))
        .route("/jobs/{job_id}", delete(delete_job))
        .route("/jobs", get(list_jobs))
        .route("/workers", get(list_workers))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn enqueue_regional(
    State(state): State<AppState>,
    Json(template): Json<Template>,
) -> Result<StatusCode202, ApiError> {
    state.broker.enqueue_job(template, now_millis()).await?;
    Ok(StatusCode202)
}

async fn dequeue_regional(
    State(state): State<AppState>,
    Json(status): Json<WorkerStatus>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state.broker.dequeue_work(status, now_millis()).await?;
    Ok(Json(tasks))
}

async fn complete_task(
    State(state): State<AppState>,
    Path((job_id, task_index)): Path<(String, u32)>,
) -> Response {
    match state.broker.complete_task(job_id.clone(), task_index).await {
        Ok(true) => StatusCode200.into_response(),
        Ok(false) => not_found(format!("job '{job_id}' or task index {task_index} not found")),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn delete_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    match state.broker.delete_job(job_id.clone()).await {
        Ok(true) => StatusCode200.into_response(),
        Ok(false) => not_found(format!("job '{job_id}' not found")),
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobStatus>>, ApiError> {
    Ok(Json(state.broker.list_jobs().await?))
}

async fn list_workers(State(state): State<AppState>) -> Result<Json<Vec<WorkerObservationView>>, ApiError> {
    Ok(Json(state.broker.list_workers().await?))
}

/// A bare 200 with no body, for handlers that only need to report success.
struct StatusCode200;
impl IntoResponse for StatusCode200 {
    fn into_response(self) -> Response {
        axum::http::StatusCode::OK.into_response()
    }
}

/// A bare 202, for job enqueueing: the job is accepted into the ring, not
/// necessarily served by a worker yet.
struct StatusCode202;
impl IntoResponse for StatusCode202 {
    fn into_response(self) -> Response {
        axum::http::StatusCode::ACCEPTED.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use broker_core::{BrokerHandle, BrokerSettings, NoopLauncher};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let settings = BrokerSettings {
            work_offline: true,
            ..BrokerSettings::default()
        };
        AppState {
            broker: BrokerHandle::spawn(settings, Arc::new(NoopLauncher)),
        }
    }

    fn template_json(job_id: &str) -> serde_json::Value {
        serde_json::json!({
            "job_id": job_id,
            "graph_id": "graph-a",
            "version": "1.0.0",
            "width": 2,
            "height": 1,
            "zoom": 10,
            "west": -74.25,
            "north": 40.9,
        })
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn enqueue_then_list_jobs_round_trips() {
        let app = router(test_state());
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/enqueue/regional")
                    .header("content-type", "application/json")
                    .body(Body::from(template_json("j1").to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let response = app
            .oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_conflict() {
        let app = router(test_state());
        let request = || {
            Request::builder()
                .method("POST")
                .uri("/enqueue/regional")
                .header("content-type", "application/json")
                .body(Body::from(template_json("j1").to_string()))
                .unwrap()
        };
        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn complete_unknown_job_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/complete/missing/0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_unknown_job_is_not_found() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/jobs/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
