use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Where a [`PlanStep`] input value comes from at execution time.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputSource {
    /// A fixed value baked into the plan.
    Literal { value: Value },
    /// The (optionally dotted-path) output of a previous step.
    StepOutput { step_id: String, path: Option<String> },
    /// A value pulled from the task's context map.
    Context { key: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StepInput {
    pub name: String,
    pub source: InputSource,
    #[serde(default)]
    pub required: bool,
    pub default: Option<Value>,
}

/// An atomic agent action within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlanStep {
    pub id: String,
    pub name: String,
    pub description: String,
    pub agent_id: String,
    pub action_type: String,
    #[serde(default)]
    pub action_params: Value,
    #[serde(default)]
    pub inputs: Vec<StepInput>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: u32,
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub requires_approval: bool,
    pub approval_prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandlingPolicy {
    Abort,
    Retry,
    Skip,
}

impl Default for ErrorHandlingPolicy {
    fn default() -> Self {
        ErrorHandlingPolicy::Abort
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlanEstimates {
    pub duration_ms: Option<u64>,
    pub cost: Option<f64>,
    pub confidence: Option<f32>,
}

/// A directed-acyclic set of steps that satisfies a [`crate::Task`]'s goal.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ExecutionPlan {
    pub id: Uuid,
    pub task_id: Uuid,
    pub version: u32,
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub default_error_handling: ErrorHandlingPolicy,
    #[serde(default)]
    pub estimates: PlanEstimates,
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    pub fn new(task_id: Uuid, version: u32, steps: Vec<PlanStep>) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_id,
            version,
            steps,
            default_error_handling: ErrorHandlingPolicy::default(),
            estimates: PlanEstimates::default(),
            created_at: Utc::now(),
        }
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}
