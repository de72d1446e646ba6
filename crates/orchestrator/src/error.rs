use contracts::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("step failed: {0}")]
    StepFailed(String),

    #[error("step timed out after {0}ms")]
    Timeout(u64),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("step exceeded the maximum number of agent-loop iterations")]
    MaxIterations,

    #[error("planning error: {0}")]
    PlanningError(String),

    #[error("required input '{0}' is missing and has no default")]
    Validation(String),

    #[error("task was cancelled")]
    Cancelled,

    #[error("persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("provider error: {0}")]
    Provider(#[from] agent_loop::AgentLoopError),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl OrchestratorError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OrchestratorError::StepFailed(_) => ErrorCode::StepFailed,
            OrchestratorError::Timeout(_) => ErrorCode::Timeout,
            OrchestratorError::AgentNotFound(_) => ErrorCode::AgentNotFound,
            OrchestratorError::MaxIterations => ErrorCode::MaxIterations,
            OrchestratorError::PlanningError(_) => ErrorCode::PlanningError,
            OrchestratorError::Validation(_) => ErrorCode::Validation,
            OrchestratorError::Cancelled => ErrorCode::Cancelled,
            OrchestratorError::Persistence(_) => ErrorCode::Persistence,
            OrchestratorError::Provider(_) => ErrorCode::ProviderError,
            OrchestratorError::Unknown(_) => ErrorCode::Unknown,
        }
    }

    pub fn to_error_detail(&self) -> contracts::ErrorDetail {
        contracts::ErrorDetail::new(self.code(), self.to_string())
    }
}
