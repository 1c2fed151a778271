//! HTTP API tests over the router in fixture mode.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use lead_forge::api::router;
use lead_forge::config::AppConfig;
use lead_forge::service::GenerationService;

fn app() -> Router {
    let config = AppConfig::default().with_fixture_step_delay(Duration::ZERO);
    router(GenerationService::new(config).unwrap())
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn submit(app: &Router, prompt: &str) -> Response {
    send(
        app,
        Request::post("/generation-tasks")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "prompt": prompt }).to_string()))
            .unwrap(),
    )
    .await
}

async fn wait_completed(app: &Router, task_id: &str) -> Value {
    for _ in 0..200 {
        let body = body_json(send(app, get(&format!("/generation-tasks/{}", task_id))).await).await;
        if body["status"] == "completed" || body["status"] == "failed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} did not finish", task_id);
}

#[tokio::test]
async fn test_submit_poll_export_delete() {
    let app = app();

    let response = submit(&app, "Manufacturers in Texas").await;
    assert_eq!(response.status(), StatusCode::OK);
    let submitted = body_json(response).await;
    assert_eq!(submitted["status"], "queued");
    assert_eq!(submitted["message"], "Lead generation started");
    let task_id = submitted["task_id"].as_str().unwrap().to_string();

    let task = wait_completed(&app, &task_id).await;
    assert_eq!(task["status"], "completed");
    assert_eq!(task["progress"]["current_step"], "Creating emails");
    assert_eq!(task["progress"]["steps_completed"], 5);
    assert_eq!(task["progress"]["total_steps"], 5);
    assert_eq!(task["result"]["leads"][0]["company"], "Texas Instruments");
    assert!(task["error"].is_null());

    let response = send(&app, get(&format!("/generation-tasks/{}/export?format=json", task_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    let exported = body_json(response).await;
    assert_eq!(exported["emails"][0]["company"], "Texas Instruments");

    let response = send(&app, get(&format!("/generation-tasks/{}/export?format=tabular", task_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let csv = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(csv.starts_with("kind,company"));
    assert!(csv.contains("Dell Technologies"));

    let response = send(&app, get(&format!("/generation-tasks/{}/export?format=xlsx", task_id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains(".xlsx"));
    assert!(body_bytes(response).await.starts_with(b"PK"));

    let response = send(
        &app,
        Request::delete(format!("/generation-tasks/{}", task_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        Request::delete(format!("/generation-tasks/{}", task_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_unsupported_format() {
    let app = app();
    let task_id = body_json(submit(&app, "p").await).await["task_id"]
        .as_str()
        .unwrap()
        .to_string();
    wait_completed(&app, &task_id).await;

    let response = send(
        &app,
        get(&format!("/generation-tasks/{}/export?format=unsupported-xyz", task_id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("unsupported-xyz"));
}

#[tokio::test]
async fn test_export_unfinished_task_is_bad_request() {
    let config = AppConfig::default().with_fixture_step_delay(Duration::from_secs(5));
    let app = router(GenerationService::new(config).unwrap());

    let task_id = body_json(submit(&app, "p").await).await["task_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = send(
        &app,
        get(&format!("/generation-tasks/{}/export?format=unsupported-xyz", task_id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("not completed"));
}

#[tokio::test]
async fn test_list_tasks() {
    let app = app();
    submit(&app, "first").await;
    submit(&app, "second").await;

    let body = body_json(send(&app, get("/generation-tasks")).await).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["tasks"][0]["prompt"], "first");
    assert_eq!(body["tasks"][1]["prompt"], "second");
}

#[tokio::test]
async fn test_unknown_routes_and_ids() {
    let app = app();

    let response = send(&app, get("/generation-tasks/missing/export")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(
        &app,
        Request::delete("/generation-tasks/missing")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    lead_forge::metrics::init_metrics().unwrap();
    let app = app();
    submit(&app, "p").await;

    let response = send(&app, get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("lead_forge_tasks_submitted_total"));
}
