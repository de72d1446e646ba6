use contracts::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{0}': {1}")]
    InvalidCron(String, String),

    #[error("job not found: {0}")]
    JobNotFound(uuid::Uuid),

    #[error("webhook job failed: {0}")]
    Webhook(String),

    #[error("command job failed: {0}")]
    Command(String),

    #[error("job timed out")]
    Timeout,

    #[error("persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("workflow engine error: {0}")]
    WorkflowEngine(#[from] workflow_engine::WorkflowEngineError),
}

impl SchedulerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SchedulerError::InvalidCron(..) => ErrorCode::Validation,
            SchedulerError::JobNotFound(_) => ErrorCode::NotFound,
            SchedulerError::Webhook(_) => ErrorCode::ProviderError,
            SchedulerError::Command(_) => ErrorCode::Unknown,
            SchedulerError::Timeout => ErrorCode::Timeout,
            SchedulerError::Persistence(_) => ErrorCode::Persistence,
            SchedulerError::WorkflowEngine(e) => e.code(),
        }
    }

    pub fn to_error_detail(&self) -> contracts::ErrorDetail {
        contracts::ErrorDetail::new(self.code(), self.to_string())
    }
}
