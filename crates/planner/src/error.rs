use contracts::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("step {step} depends on unknown step {dependency}")]
    UnknownDependency { step: String, dependency: String },

    #[error("cycle detected in plan dependency graph")]
    CycleDetected,

    #[error("step {0} references unknown agent id")]
    UnknownAgent(String),

    #[error("provider error: {0}")]
    Provider(#[from] agent_loop::AgentLoopError),

    #[error("could not parse planner response: {0}")]
    ParseFailure(String),
}

impl PlannerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PlannerError::DuplicateStepId(_)
            | PlannerError::UnknownDependency { .. }
            | PlannerError::CycleDetected
            | PlannerError::UnknownAgent(_) => ErrorCode::Validation,
            PlannerError::Provider(_) => ErrorCode::ProviderError,
            PlannerError::ParseFailure(_) => ErrorCode::PlanningError,
        }
    }
}
