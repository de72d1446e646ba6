use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// When a [`ScheduledJob`] fires.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// A five-field cron expression, e.g. `"0 9 * * mon-fri"`, or an `@alias`.
    Cron { expression: String },
    /// Fires every `interval_ms`, relative to the last execution (or job creation).
    Interval { interval_ms: u64 },
    /// Fires exactly once at `at`.
    Once { at: DateTime<Utc> },
}

/// What a [`ScheduledJob`] does when it fires.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobConfig {
    Task { message: String },
    Workflow { workflow_id: Uuid, input: Value },
    Webhook {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        body: Option<Value>,
    },
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        cwd: Option<String>,
    },
}

fn default_method() -> String {
    "POST".to_string()
}

/// A persistent trigger that creates [`crate::JobExecution`]s when its
/// [`Schedule`] fires.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ScheduledJob {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub schedule: Schedule,
    pub config: JobConfig,
    pub enabled: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub timeout_ms: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledJob {
    pub fn new(name: impl Into<String>, schedule: Schedule, config: JobConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            description: None,
            schedule,
            config,
            enabled: true,
            max_retries: 3,
            retry_delay_ms: 5_000,
            timeout_ms: 300_000,
            tags: Vec::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}
