//! HTTP surface for generation tasks.
//!
//! ```text
//! POST   /generation-tasks                    - Submit a prompt
//! GET    /generation-tasks                    - List tasks
//! GET    /generation-tasks/{task_id}          - Poll a task
//! DELETE /generation-tasks/{task_id}          - Delete a task
//! GET    /generation-tasks/{task_id}/export   - Export a completed result
//! GET    /                                    - Health check
//! GET    /metrics                             - Prometheus metrics
//! ```

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::metrics::{init_metrics, metrics_handler};
use crate::service::{GenerationService, ServiceError, SubmitResponse, TaskList, TaskStatusView};

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct SubmitRequest {
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct ExportQuery {
    #[serde(default = "default_format")]
    format: String,
}

fn default_format() -> String {
    "json".to_string()
}

#[derive(Debug, Serialize)]
struct Health {
    message: &'static str,
    version: &'static str,
    status: &'static str,
}

/// Build the application router over `service`.
pub fn router(service: GenerationService) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/metrics", get(metrics_handler))
        .route("/generation-tasks", get(list_tasks).post(submit_task))
        .route(
            "/generation-tasks/{task_id}",
            get(get_task).delete(delete_task),
        )
        .route("/generation-tasks/{task_id}/export", get(export_task))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Serve the API until the process is stopped.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    init_metrics()?;

    let address = config.bind_address();
    let mode = config.mode;
    let service = GenerationService::new(config)?;
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, mode = %mode, "Lead forge API listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// GET / - health check
async fn health() -> Json<Health> {
    Json(Health {
        message: "Lead forge API is running",
        version: env!("CARGO_PKG_VERSION"),
        status: "healthy",
    })
}

/// POST /generation-tasks - submit a prompt
async fn submit_task(
    State(service): State<GenerationService>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ServiceError> {
    Ok(Json(service.submit(&request.prompt).await?))
}

/// GET /generation-tasks - list tasks
async fn list_tasks(State(service): State<GenerationService>) -> Json<TaskList> {
    Json(service.list().await)
}

/// GET /generation-tasks/{task_id} - poll a task
async fn get_task(
    State(service): State<GenerationService>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatusView>, ServiceError> {
    Ok(Json(service.status(&task_id).await?))
}

/// DELETE /generation-tasks/{task_id} - delete a task
async fn delete_task(
    State(service): State<GenerationService>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    service.delete(&task_id).await?;
    Ok(Json(serde_json::json!({ "message": "Task deleted", "task_id": task_id })))
}

/// GET /generation-tasks/{task_id}/export?format= - export a result
async fn export_task(
    State(service): State<GenerationService>,
    Path(task_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ServiceError> {
    let artifact = service.export(&task_id, &query.format).await?;
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}
