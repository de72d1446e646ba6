use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use contracts::{WorkflowDefinition, WorkflowEdge, WorkflowExecution, WorkflowNode};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::context::ServerContext;
use crate::error::ApiError;

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub input_schema: Value,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub variables: std::collections::HashMap<String, Value>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, Value>,
}

#[utoipa::path(
    post,
    path = "/api/workflows",
    request_body = CreateWorkflowRequest,
    responses((status = 201, description = "Workflow created", body = WorkflowDefinition)),
    tag = "workflows",
    security(("bearer_auth" = []))
)]
pub async fn create_workflow(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Json(req): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowDefinition>), ApiError> {
    let now = Utc::now();
    let workflow = WorkflowDefinition {
        id: Uuid::now_v7(),
        name: req.name,
        version: 1,
        input_schema: req.input_schema,
        nodes: req.nodes,
        edges: req.edges,
        variables: req.variables,
        metadata: req.metadata,
        created_at: now,
        updated_at: now,
    };

    if workflow.start_node_id().is_none() {
        return Err(ApiError::validation("workflow must contain a start node"));
    }

    ctx.db.save_workflow(&workflow).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[utoipa::path(
    get,
    path = "/api/workflows",
    responses((status = 200, description = "All workflows", body = [WorkflowDefinition])),
    tag = "workflows",
    security(("bearer_auth" = []))
)]
pub async fn list_workflows(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
) -> Result<Json<Vec<WorkflowDefinition>>, ApiError> {
    Ok(Json(ctx.db.list_workflows().await?))
}

#[utoipa::path(
    get,
    path = "/api/workflows/{id}",
    responses(
        (status = 200, description = "A workflow definition", body = WorkflowDefinition),
        (status = 404, description = "No such workflow")
    ),
    tag = "workflows",
    security(("bearer_auth" = []))
)]
pub async fn get_workflow(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    let workflow = ctx.db.get_workflow(id).await?.ok_or_else(|| ApiError::not_found("workflow not found"))?;
    Ok(Json(workflow))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub input_schema: Option<Value>,
    pub nodes: Option<Vec<WorkflowNode>>,
    pub edges: Option<Vec<WorkflowEdge>>,
    pub variables: Option<std::collections::HashMap<String, Value>>,
    pub metadata: Option<std::collections::HashMap<String, Value>>,
}

#[utoipa::path(
    patch,
    path = "/api/workflows/{id}",
    request_body = UpdateWorkflowRequest,
    responses(
        (status = 200, description = "Updated workflow", body = WorkflowDefinition),
        (status = 404, description = "No such workflow")
    ),
    tag = "workflows",
    security(("bearer_auth" = []))
)]
pub async fn update_workflow(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateWorkflowRequest>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    let mut workflow = ctx.db.get_workflow(id).await?.ok_or_else(|| ApiError::not_found("workflow not found"))?;

    if let Some(v) = req.name {
        workflow.name = v;
    }
    if let Some(v) = req.input_schema {
        workflow.input_schema = v;
    }
    if let Some(v) = req.nodes {
        workflow.nodes = v;
    }
    if let Some(v) = req.edges {
        workflow.edges = v;
    }
    if let Some(v) = req.variables {
        workflow.variables = v;
    }
    if let Some(v) = req.metadata {
        workflow.metadata = v;
    }
    workflow.version += 1;
    workflow.updated_at = Utc::now();

    ctx.db.save_workflow(&workflow).await?;
    Ok(Json(workflow))
}

#[utoipa::path(
    delete,
    path = "/api/workflows/{id}",
    responses((status = 204, description = "Workflow deleted")),
    tag = "workflows",
    security(("bearer_auth" = []))
)]
pub async fn delete_workflow(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.db.delete_workflow(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct ExecuteWorkflowRequest {
    #[serde(default)]
    pub input: Value,
}

#[utoipa::path(
    post,
    path = "/api/workflows/{id}/execute",
    request_body = ExecuteWorkflowRequest,
    responses(
        (status = 200, description = "Workflow run to completion or to its first suspend point", body = WorkflowExecution),
        (status = 404, description = "No such workflow")
    ),
    tag = "workflows",
    security(("bearer_auth" = []))
)]
pub async fn execute_workflow(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ExecuteWorkflowRequest>,
) -> Result<Json<WorkflowExecution>, ApiError> {
    let workflow = ctx.db.get_workflow(id).await?.ok_or_else(|| ApiError::not_found("workflow not found"))?;
    let execution =
        ctx.workflow_engine.run(&workflow, req.input, &workflow_engine::NoopCallbacks).await?;
    Ok(Json(execution))
}

#[derive(Debug, Deserialize)]
pub struct ExecutionsQuery {
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/workflows/{id}/executions",
    responses((status = 200, description = "Execution history", body = [WorkflowExecution])),
    tag = "workflows",
    security(("bearer_auth" = []))
)]
pub async fn workflow_executions(
    State(ctx): State<ServerContext>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<Vec<WorkflowExecution>>, ApiError> {
    let mut executions = ctx.db.list_workflow_executions(id).await?;
    let limit = query.limit.unwrap_or(20).max(0) as usize;
    executions.truncate(limit);
    Ok(Json(executions))
}

/// A small built-in set of starter workflows, analogous to the orchestrator's
/// built-in agents — illustrative scaffolds an embedder can clone rather
/// than persisted records.
#[utoipa::path(
    get,
    path = "/api/workflow-templates",
    responses((status = 200, description = "Built-in workflow templates", body = [WorkflowDefinition])),
    tag = "workflows",
    security(("bearer_auth" = []))
)]
pub async fn workflow_templates(_user: AuthUser) -> Json<Vec<WorkflowDefinition>> {
    Json(vec![approval_template()])
}

fn approval_template() -> WorkflowDefinition {
    let now = Utc::now();
    WorkflowDefinition {
        id: Uuid::now_v7(),
        name: "simple_approval".to_string(),
        version: 1,
        input_schema: Value::Null,
        nodes: vec![
            WorkflowNode { id: "start".to_string(), config: contracts::NodeConfig::Start },
            WorkflowNode {
                id: "approve".to_string(),
                config: contracts::NodeConfig::HumanInput {
                    prompt: "Approve this request?".to_string(),
                    fields: vec!["approved".to_string()],
                },
            },
            WorkflowNode { id: "end".to_string(), config: contracts::NodeConfig::End },
        ],
        edges: vec![
            WorkflowEdge { id: "start_to_approve".to_string(), source: "start".to_string(), target: "approve".to_string(), condition: None },
            WorkflowEdge { id: "approve_to_end".to_string(), source: "approve".to_string(), target: "end".to_string(), condition: None },
        ],
        variables: std::collections::HashMap::new(),
        metadata: std::collections::HashMap::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn routes() -> Router<ServerContext> {
    Router::new()
        .route("/api/workflows", post(create_workflow).get(list_workflows))
        .route("/api/workflows/:id", get(get_workflow).patch(update_workflow).delete(delete_workflow))
        .route("/api/workflows/:id/execute", post(execute_workflow))
        .route("/api/workflows/:id/executions", get(workflow_executions))
        .route("/api/workflow-templates", get(workflow_templates))
}
