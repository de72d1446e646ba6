// Error types for the agent loop

use contracts::ErrorCode;
use thiserror::Error;

/// Result type alias for agent loop operations
pub type Result<T> = std::result::Result<T, AgentLoopError>;

/// Errors that can occur during agent loop execution
#[derive(Debug, Error)]
pub enum AgentLoopError {
    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Tool execution error
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Message store error
    #[error("Message store error: {0}")]
    MessageStore(String),

    /// Event emission error
    #[error("Event emission error: {0}")]
    EventEmission(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Loop terminated due to max iterations
    #[error("Max iterations ({0}) reached")]
    MaxIterationsReached(usize),

    /// Loop was cancelled
    #[error("Loop cancelled")]
    Cancelled,

    /// No messages to process
    #[error("No messages to process")]
    NoMessages,

    /// Agent not found
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AgentLoopError {
    /// Map this error onto the shared error taxonomy, for persistence into a
    /// [`contracts::StepResult`].
    pub fn code(&self) -> ErrorCode {
        match self {
            AgentLoopError::Llm(_) => ErrorCode::ProviderError,
            AgentLoopError::ToolExecution(_) => ErrorCode::StepFailed,
            AgentLoopError::MessageStore(_) => ErrorCode::Persistence,
            AgentLoopError::EventEmission(_) => ErrorCode::Unknown,
            AgentLoopError::Configuration(_) => ErrorCode::Validation,
            AgentLoopError::MaxIterationsReached(_) => ErrorCode::MaxIterations,
            AgentLoopError::Cancelled => ErrorCode::Cancelled,
            AgentLoopError::NoMessages => ErrorCode::Validation,
            AgentLoopError::AgentNotFound(_) => ErrorCode::AgentNotFound,
            AgentLoopError::Internal(_) => ErrorCode::Unknown,
        }
    }
}

impl AgentLoopError {
    /// Create an LLM error
    pub fn llm(msg: impl Into<String>) -> Self {
        AgentLoopError::Llm(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        AgentLoopError::ToolExecution(msg.into())
    }

    /// Create a message store error
    pub fn store(msg: impl Into<String>) -> Self {
        AgentLoopError::MessageStore(msg.into())
    }

    /// Create an event emission error
    pub fn event(msg: impl Into<String>) -> Self {
        AgentLoopError::EventEmission(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        AgentLoopError::Configuration(msg.into())
    }

    /// Create an agent not found error
    pub fn agent_not_found(agent_id: impl Into<String>) -> Self {
        AgentLoopError::AgentNotFound(agent_id.into())
    }
}
