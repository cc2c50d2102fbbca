//! End-to-end HTTP surface tests: a real axum router over a real broker
//! actor, no mocking of either.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use broker_core::{BrokerHandle, BrokerSettings, NoopLauncher};
use broker_server::http::{router, AppState};
use broker_types::{JobStatus, Task, WorkerObservationView};
use serde_json::json;
use tower::ServiceExt;

fn test_app() -> axum::Router {
    let settings = BrokerSettings {
        work_offline: true,
        redelivery_quiet_period_millis: 0,
        ..BrokerSettings::default()
    };
    let broker = BrokerHandle::spawn(settings, Arc::new(NoopLauncher));
    router(AppState { broker })
}

async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn enqueue_request(job_id: &str, width: u32, height: u32) -> Request<Body> {
    let body = json!({
        "job_id": job_id,
        "graph_id": "graph-a",
        "version": "1.0.0",
        "width": width,
        "height": height,
        "zoom": 10,
        "west": -74.25,
        "north": 40.9,
    });
    Request::builder()
        .method("POST")
        .uri("/enqueue/regional")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn dequeue_request(worker_id: &str) -> Request<Body> {
    dequeue_request_with_version(worker_id, "1.0.0")
}

fn dequeue_request_with_version(worker_id: &str, version: &str) -> Request<Body> {
    let body = json!({
        "worker_id": worker_id,
        "graph_id": "graph-a",
        "version": version,
        "ip_address": "10.0.0.5",
    });
    Request::builder()
        .method("POST")
        .uri("/dequeue/regional")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn full_lifecycle_enqueue_dequeue_complete_retires_job() {
    let app = test_app();

    let response = app.clone().oneshot(enqueue_request("job-1", 2, 1)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = app.clone().oneshot(dequeue_request("worker-1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tasks: Vec<Task> = json_body(response).await;
    assert_eq!(tasks.len(), 2);

    for task in &tasks {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/complete/{}/{}", task.job_id, task.task_index))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(Request::builder().uri("/jobs").body(Body::empty()).unwrap()).await.unwrap();
    let jobs: Vec<JobStatus> = json_body(response).await;
    assert!(jobs.is_empty(), "completed job should have been retired from the ring");
}

#[tokio::test]
async fn dequeue_records_the_poller_in_the_worker_listing() {
    let app = test_app();
    app.clone().oneshot(enqueue_request("job-2", 1, 1)).await.unwrap();
    app.clone().oneshot(dequeue_request("worker-7")).await.unwrap();

    let response = app.oneshot(Request::builder().uri("/workers").body(Body::empty()).unwrap()).await.unwrap();
    let workers: Vec<WorkerObservationView> = json_body(response).await;
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].worker_id, "worker-7");
}

#[tokio::test]
async fn deleting_a_job_removes_it_from_dispatch() {
    let app = test_app();
    app.clone().oneshot(enqueue_request("job-3", 4, 4)).await.unwrap();

    let response = app
        .clone()
        .oneshot(Request::builder().method("DELETE").uri("/jobs/job-3").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(dequeue_request("worker-1")).await.unwrap();
    let tasks: Vec<Task> = json_body(response).await;
    assert!(tasks.is_empty());
}

#[tokio::test]
async fn offline_worker_draws_work_despite_a_version_mismatch() {
    let app = test_app();
    app.clone().oneshot(enqueue_request("job-4", 1, 1)).await.unwrap();

    // The poller has graph-a loaded but an older version than job-4
    // requires; offline mode widens affinity to a graph-only match.
    let response = app.oneshot(dequeue_request_with_version("worker-offline", "0.9.0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tasks: Vec<Task> = json_body(response).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].job_id, "job-4");
}

#[tokio::test]
async fn invalid_template_grid_is_rejected_with_bad_request() {
    let app = test_app();
    let body = json!({
        "job_id": "job-bad",
        "graph_id": "graph-a",
        "version": "1.0.0",
        "width": 0,
        "height": 0,
        "zoom": 10,
        "west": 0.0,
        "north": 0.0,
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/enqueue/regional")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
