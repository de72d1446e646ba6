use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use contracts::{JobConfig, JobExecution, Schedule, ScheduledJob};
use serde::Deserialize;
use storage::executions::ExecutionFilter;
use storage::jobs::JobFilter;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::context::ServerContext;
use crate::error::ApiError;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateJobRequest {
    pub name: String,
    pub description: Option<String>,
    pub schedule: Schedule,
    pub config: JobConfig,
    #[serde(default)]
    pub enabled: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/api/scheduler/jobs",
    request_body = CreateJobRequest,
    responses((status = 201, description = "Job created", body = ScheduledJob)),
    tag = "scheduler",
    security(("bearer_auth" = []))
)]
pub async fn create_job(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ScheduledJob>), ApiError> {
    if let Schedule::Cron { expression } = &req.schedule {
        scheduler::ParsedCron::parse(expression).map_err(|e| ApiError::validation(e.to_string()))?;
    }

    let mut job = ScheduledJob::new(req.name, req.schedule, req.config);
    job.description = req.description;
    job.enabled = req.enabled.unwrap_or(true);
    if let Some(v) = req.max_retries {
        job.max_retries = v;
    }
    if let Some(v) = req.retry_delay_ms {
        job.retry_delay_ms = v;
    }
    if let Some(v) = req.timeout_ms {
        job.timeout_ms = v;
    }
    job.tags = req.tags;

    ctx.db.create_job(&job).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

#[utoipa::path(
    get,
    path = "/api/scheduler/jobs",
    responses((status = 200, description = "All scheduled jobs", body = [ScheduledJob])),
    tag = "scheduler",
    security(("bearer_auth" = []))
)]
pub async fn list_jobs(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
) -> Result<Json<Vec<ScheduledJob>>, ApiError> {
    Ok(Json(ctx.db.list_jobs(&JobFilter::default()).await?))
}

#[utoipa::path(
    get,
    path = "/api/scheduler/jobs/{id}",
    responses(
        (status = 200, description = "A scheduled job", body = ScheduledJob),
        (status = 404, description = "No such job")
    ),
    tag = "scheduler",
    security(("bearer_auth" = []))
)]
pub async fn get_job(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledJob>, ApiError> {
    let job = ctx.db.get_job(id).await?.ok_or_else(|| ApiError::not_found("job not found"))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateJobRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub schedule: Option<Schedule>,
    pub config: Option<JobConfig>,
    pub enabled: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub tags: Option<Vec<String>>,
}

#[utoipa::path(
    patch,
    path = "/api/scheduler/jobs/{id}",
    request_body = UpdateJobRequest,
    responses(
        (status = 200, description = "Updated job", body = ScheduledJob),
        (status = 404, description = "No such job")
    ),
    tag = "scheduler",
    security(("bearer_auth" = []))
)]
pub async fn update_job(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<ScheduledJob>, ApiError> {
    let mut job = ctx.db.get_job(id).await?.ok_or_else(|| ApiError::not_found("job not found"))?;

    if let Some(schedule) = &req.schedule {
        if let Schedule::Cron { expression } = schedule {
            scheduler::ParsedCron::parse(expression).map_err(|e| ApiError::validation(e.to_string()))?;
        }
    }

    if let Some(v) = req.name {
        job.name = v;
    }
    if req.description.is_some() {
        job.description = req.description;
    }
    if let Some(v) = req.schedule {
        job.schedule = v;
    }
    if let Some(v) = req.config {
        job.config = v;
    }
    if let Some(v) = req.enabled {
        job.enabled = v;
    }
    if let Some(v) = req.max_retries {
        job.max_retries = v;
    }
    if let Some(v) = req.retry_delay_ms {
        job.retry_delay_ms = v;
    }
    if let Some(v) = req.timeout_ms {
        job.timeout_ms = v;
    }
    if let Some(v) = req.tags {
        job.tags = v;
    }

    ctx.db.update_job(&job).await?;
    Ok(Json(job))
}

#[utoipa::path(
    delete,
    path = "/api/scheduler/jobs/{id}",
    responses((status = 204, description = "Job deleted")),
    tag = "scheduler",
    security(("bearer_auth" = []))
)]
pub async fn delete_job(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.db.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ToggleJobRequest {
    pub enabled: bool,
}

#[utoipa::path(
    post,
    path = "/api/scheduler/jobs/{id}/toggle",
    request_body = ToggleJobRequest,
    responses(
        (status = 200, description = "Updated job", body = ScheduledJob),
        (status = 404, description = "No such job")
    ),
    tag = "scheduler",
    security(("bearer_auth" = []))
)]
pub async fn toggle_job(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ToggleJobRequest>,
) -> Result<Json<ScheduledJob>, ApiError> {
    ctx.db.set_job_enabled(id, req.enabled).await?;
    let job = ctx.db.get_job(id).await?.ok_or_else(|| ApiError::not_found("job not found"))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct ExecutionsQuery {
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/scheduler/jobs/{id}/executions",
    responses((status = 200, description = "Execution history", body = [JobExecution])),
    tag = "scheduler",
    security(("bearer_auth" = []))
)]
pub async fn job_executions(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<Vec<JobExecution>>, ApiError> {
    let mut executions = ctx.db.list_executions(&ExecutionFilter { job_id: Some(id), status: None }).await?;
    let limit = query.limit.unwrap_or(20).max(0) as usize;
    executions.truncate(limit);
    Ok(Json(executions))
}

#[utoipa::path(
    post,
    path = "/api/scheduler/jobs/{id}/run",
    responses(
        (status = 200, description = "Execution launched", body = JobExecution),
        (status = 404, description = "No such job")
    ),
    tag = "scheduler",
    security(("bearer_auth" = []))
)]
pub async fn run_job(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JobExecution>, ApiError> {
    let execution = ctx.scheduler.run_job_now(id).await?;
    Ok(Json(execution))
}

pub fn routes() -> Router<ServerContext> {
    Router::new()
        .route("/api/scheduler/jobs", post(create_job).get(list_jobs))
        .route("/api/scheduler/jobs/:id", get(get_job).patch(update_job).delete(delete_job))
        .route("/api/scheduler/jobs/:id/toggle", post(toggle_job))
        .route("/api/scheduler/jobs/:id/executions", get(job_executions))
        .route("/api/scheduler/jobs/:id/run", post(run_job))
}
