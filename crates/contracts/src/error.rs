use serde::{Deserialize, Serialize};
use std::fmt;

/// The error taxonomy shared across the orchestrator, planner, workflow engine
/// and scheduler. Every failure surfaced to a client or persisted in a
/// [`crate::StepResult`]/[`crate::JobExecution`] carries one of these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    Unauthorized,
    Forbidden,
    AgentNotFound,
    ToolNotFound,
    Timeout,
    MaxIterations,
    PlanningError,
    StepFailed,
    ProviderError,
    Persistence,
    Cancelled,
    Unknown,
}

impl ErrorCode {
    /// Whether a caller may reasonably retry after this error.
    pub fn retryable(self) -> bool {
        matches!(
            self,
            ErrorCode::Timeout | ErrorCode::ProviderError | ErrorCode::StepFailed
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Validation => "validation",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::AgentNotFound => "agent_not_found",
            ErrorCode::ToolNotFound => "tool_not_found",
            ErrorCode::Timeout => "timeout",
            ErrorCode::MaxIterations => "max_iterations",
            ErrorCode::PlanningError => "planning_error",
            ErrorCode::StepFailed => "step_failed",
            ErrorCode::ProviderError => "provider_error",
            ErrorCode::Persistence => "persistence",
            ErrorCode::Cancelled => "cancelled",
            ErrorCode::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A structured error attached to a [`crate::StepResult`] or [`crate::JobExecution`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl ErrorDetail {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let retryable = code.retryable();
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
