// The explicit, passed-in application state every handler receives via axum
// `State` — no module-level globals anywhere in the workspace (REDESIGN
// FLAGS §9).

use std::sync::Arc;

use agent_loop::InMemoryMemoryStore;
use orchestrator::Orchestrator;
use scheduler::Scheduler;
use storage::Database;
use workflow_engine::WorkflowEngine;

use crate::config::ServerConfig;
use crate::stream::StreamHub;

#[derive(Clone)]
pub struct ServerContext {
    pub db: Database,
    pub orchestrator: Arc<Orchestrator>,
    pub workflow_engine: Arc<WorkflowEngine>,
    pub scheduler: Arc<Scheduler>,
    pub memory: Arc<InMemoryMemoryStore>,
    pub hub: Arc<StreamHub>,
    pub jwt_secret: Arc<str>,
}

impl ServerContext {
    pub async fn bootstrap(config: &ServerConfig) -> anyhow::Result<Self> {
        let db = Database::connect(&config.db_path).await?;
        let orchestrator = Arc::new(Orchestrator::with_defaults(db.clone()));
        let workflow_engine = Arc::new(WorkflowEngine::with_defaults(db.clone()));
        let scheduler = Arc::new(Scheduler::with_defaults(
            db.clone(),
            Arc::clone(&orchestrator),
            Arc::clone(&workflow_engine),
        ));

        Ok(Self {
            db,
            orchestrator,
            workflow_engine,
            scheduler,
            memory: Arc::new(InMemoryMemoryStore::new()),
            hub: Arc::new(StreamHub::new()),
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
        })
    }
}
