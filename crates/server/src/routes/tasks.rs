use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{Task, TaskPhase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orchestrator::NoopCallbacks;

use crate::auth::AuthUser;
use crate::context::ServerContext;
use crate::error::ApiError;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateTaskRequest {
    pub message: String,
    pub language: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateTaskResponse {
    pub task_id: Option<Uuid>,
    pub status: String,
    pub summary: Option<String>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = CreateTaskRequest,
    responses((status = 200, description = "Message handled", body = CreateTaskResponse)),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn create_task(
    State(ctx): State<ServerContext>,
    user: AuthUser,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<CreateTaskResponse>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::validation("message must not be empty"));
    }

    let result = ctx
        .orchestrator
        .handle_message(&req.message, user.user_id, req.language.as_deref(), &NoopCallbacks)
        .await;

    let status = if result.error.is_some() {
        "failed"
    } else if result.task_id.is_some() {
        "completed"
    } else {
        "answered"
    };

    Ok(Json(CreateTaskResponse {
        task_id: result.task_id,
        status: status.to_string(),
        summary: result.summary,
        duration_ms: result.duration_ms,
        error: result.error,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn parse_phase(status: &str) -> Option<TaskPhase> {
    match status {
        "planning" => Some(TaskPhase::Planning),
        "executing" => Some(TaskPhase::Executing),
        "completed" => Some(TaskPhase::Completed),
        "failed" => Some(TaskPhase::Failed),
        _ => None,
    }
}

#[utoipa::path(
    get,
    path = "/api/tasks",
    responses((status = 200, description = "Paged task list", body = [Task])),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn list_tasks(
    State(ctx): State<ServerContext>,
    user: AuthUser,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let phase = query.status.as_deref().and_then(parse_phase);
    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let tasks = ctx.db.list_tasks_by_user(user.user_id, phase, limit, offset).await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    responses(
        (status = 200, description = "A persisted task", body = Task),
        (status = 404, description = "No such task")
    ),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn get_task(
    State(ctx): State<ServerContext>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let task = ctx.db.get_task(id).await?.ok_or_else(|| ApiError::not_found("task not found"))?;
    if task.user_id != user.user_id {
        return Err(ApiError::forbidden("task belongs to another user"));
    }
    Ok(Json(task))
}

#[utoipa::path(
    post,
    path = "/api/tasks/{id}/cancel",
    responses(
        (status = 204, description = "Cancellation requested"),
        (status = 404, description = "No such task, or it is not running")
    ),
    tag = "tasks",
    security(("bearer_auth" = []))
)]
pub async fn cancel_task(
    State(ctx): State<ServerContext>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let task = ctx.db.get_task(id).await?.ok_or_else(|| ApiError::not_found("task not found"))?;
    if task.user_id != user.user_id {
        return Err(ApiError::forbidden("task belongs to another user"));
    }

    if ctx.orchestrator.cancel_task(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("task is not currently running"))
    }
}

pub fn routes() -> Router<ServerContext> {
    Router::new()
        .route("/api/tasks", post(create_task).get(list_tasks))
        .route("/api/tasks/:id", get(get_task))
        .route("/api/tasks/:id/cancel", post(cancel_task))
}
