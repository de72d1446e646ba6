use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use storage::executions::ExecutionFilter;
use storage::jobs::JobFilter;

use crate::auth::AuthUser;
use crate::context::ServerContext;
use crate::error::ApiError;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct MemoryStats {
    pub total: usize,
    pub by_type: std::collections::HashMap<String, usize>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AgentStats {
    pub total: usize,
    pub active: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SchedulerStats {
    pub total_jobs: usize,
    pub enabled_jobs: usize,
    pub executions_today: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct WorkflowStats {
    pub total: usize,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub tasks: TaskStats,
    pub memory: MemoryStats,
    pub agents: AgentStats,
    pub scheduler: SchedulerStats,
    pub workflows: WorkflowStats,
}

/// This endpoint is deliberately account-wide rather than per-user — it
/// reflects the whole deployment's state, matching the ops-dashboard intent
/// of `/api/stats` rather than a per-tenant view.
#[utoipa::path(
    get,
    path = "/api/stats",
    responses((status = 200, description = "Aggregate deployment statistics", body = StatsResponse)),
    tag = "stats",
    security(("bearer_auth" = []))
)]
pub async fn stats(State(ctx): State<ServerContext>, _user: AuthUser) -> Result<Json<StatsResponse>, ApiError> {
    let all_jobs = ctx.db.list_jobs(&JobFilter::default()).await?;
    let enabled_jobs = all_jobs.iter().filter(|j| j.enabled).count();

    let executions = ctx.db.list_executions(&ExecutionFilter::default()).await?;
    let today = Utc::now().date_naive();
    let executions_today = executions.iter().filter(|e| e.scheduled_at.date_naive() == today).count();

    let workflows = ctx.db.list_workflows().await?;
    let task_counts = ctx.db.task_counts().await?;
    let running = ctx.orchestrator.running_task_count();
    let (memory_total, memory_by_scope) = ctx.memory.stats();

    Ok(Json(StatsResponse {
        tasks: TaskStats {
            total: task_counts.total,
            completed: task_counts.completed,
            failed: task_counts.failed,
            running: task_counts.running,
        },
        memory: MemoryStats { total: memory_total, by_type: memory_by_scope },
        agents: AgentStats { total: ctx.orchestrator.agents().list().len(), active: running },
        scheduler: SchedulerStats {
            total_jobs: all_jobs.len(),
            enabled_jobs,
            executions_today,
        },
        workflows: WorkflowStats { total: workflows.len() },
    }))
}

pub fn routes() -> Router<ServerContext> {
    Router::new().route("/api/stats", get(stats))
}
