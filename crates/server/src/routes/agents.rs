use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use contracts::AgentStatus;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::context::ServerContext;

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
}

#[utoipa::path(
    get,
    path = "/api/agents",
    responses((status = 200, description = "Registered agents", body = [AgentSummary])),
    tag = "agents",
    security(("bearer_auth" = []))
)]
pub async fn list_agents(State(ctx): State<ServerContext>, _user: AuthUser) -> Json<Vec<AgentSummary>> {
    let agents = ctx
        .orchestrator
        .agents()
        .list()
        .into_iter()
        .map(|agent| AgentSummary {
            id: agent.id.clone(),
            name: agent.name.clone(),
            description: agent.description.clone(),
            capabilities: agent.tool_names.clone(),
            status: agent.status,
        })
        .collect();
    Json(agents)
}

pub fn routes() -> Router<ServerContext> {
    Router::new().route("/api/agents", get(list_agents))
}
