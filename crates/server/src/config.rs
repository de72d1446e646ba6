// Server configuration: environment-driven, mirroring
// `orchestrator::OrchestratorConfig::from_env()`'s one-var-per-field idiom.

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub db_path: String,
    pub scheduler_db_path: String,
    pub workflow_db_path: String,
    pub jwt_secret: String,
    pub scheduler_enabled: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "meridian.sqlite".to_string());
        Self {
            http_port: std::env::var("HTTP_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(3000),
            scheduler_db_path: std::env::var("SCHEDULER_DB_PATH").unwrap_or_else(|_| db_path.clone()),
            workflow_db_path: std::env::var("WORKFLOW_DB_PATH").unwrap_or_else(|_| db_path.clone()),
            db_path,
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| "development-only-insecure-secret".to_string()),
            scheduler_enabled: std::env::var("SCHEDULER_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(true),
        }
    }
}
