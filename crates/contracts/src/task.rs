use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Normal,
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Planning,
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TaskStatus {
    pub phase: TaskPhase,
    /// Fraction of the plan completed, in `[0, 1]`.
    pub progress: f32,
}

impl TaskStatus {
    pub fn planning() -> Self {
        Self {
            phase: TaskPhase::Planning,
            progress: 0.0,
        }
    }
}

/// A unit of user intent: the thing the orchestrator plans and executes.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: Uuid, goal: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id,
            goal: goal.into(),
            context: HashMap::new(),
            constraints: Vec::new(),
            priority: TaskPriority::Normal,
            deadline: None,
            status: TaskStatus::planning(),
            summary: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}
