use contracts::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkflowEngineError>;

#[derive(Debug, Error)]
pub enum WorkflowEngineError {
    #[error("workflow has no start node")]
    NoStartNode,

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("decision node '{0}' matched no branch and has no default target")]
    NoMatchingBranch(String),

    #[error("invalid expression '{0}': {1}")]
    InvalidExpression(String, String),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("node '{0}' timed out")]
    Timeout(String),

    #[error("webhook call failed: {0}")]
    Webhook(String),

    #[error("workflow execution was cancelled")]
    Cancelled,

    #[error("persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("provider error: {0}")]
    Provider(#[from] agent_loop::AgentLoopError),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl WorkflowEngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            WorkflowEngineError::NoStartNode => ErrorCode::Validation,
            WorkflowEngineError::NodeNotFound(_) => ErrorCode::Validation,
            WorkflowEngineError::NoMatchingBranch(_) => ErrorCode::Validation,
            WorkflowEngineError::InvalidExpression(..) => ErrorCode::Validation,
            WorkflowEngineError::AgentNotFound(_) => ErrorCode::AgentNotFound,
            WorkflowEngineError::Timeout(_) => ErrorCode::Timeout,
            WorkflowEngineError::Webhook(_) => ErrorCode::ProviderError,
            WorkflowEngineError::Cancelled => ErrorCode::Cancelled,
            WorkflowEngineError::Persistence(_) => ErrorCode::Persistence,
            WorkflowEngineError::Provider(_) => ErrorCode::ProviderError,
            WorkflowEngineError::Unknown(_) => ErrorCode::Unknown,
        }
    }

    pub fn to_error_detail(&self) -> contracts::ErrorDetail {
        contracts::ErrorDetail::new(self.code(), self.to_string())
    }
}
