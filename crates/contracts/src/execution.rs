use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ErrorDetail;

/// A single logged line produced while executing a step.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: "info".to_string(),
            message: message.into(),
        }
    }
}

/// A record of one tool invocation made during a step.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// The outcome of executing one [`crate::PlanStep`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<ErrorDetail>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub cost: Option<f64>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
}

impl StepResult {
    pub fn success(step_id: impl Into<String>, output: Value, started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            step_id: step_id.into(),
            success: true,
            output: Some(output),
            error: None,
            started_at,
            completed_at,
            duration_ms,
            cost: None,
            logs: Vec::new(),
            tool_calls: Vec::new(),
        }
    }

    pub fn failure(step_id: impl Into<String>, error: ErrorDetail, started_at: DateTime<Utc>) -> Self {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            step_id: step_id.into(),
            success: false,
            output: None,
            error: Some(error),
            started_at,
            completed_at,
            duration_ms,
            cost: None,
            logs: Vec::new(),
            tool_calls: Vec::new(),
        }
    }
}

/// The status of one [`crate::JobExecution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

/// One run of a [`crate::ScheduledJob`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_id: Uuid,
    pub status: JobExecutionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<ErrorDetail>,
    pub retry_count: u32,
    pub duration_ms: Option<u64>,
}

impl JobExecution {
    pub fn new_pending(job_id: Uuid, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_id,
            status: JobExecutionStatus::Pending,
            scheduled_at,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            retry_count: 0,
            duration_ms: None,
        }
    }
}
