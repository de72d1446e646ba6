//! Shared domain types for the Meridian orchestration backend.
//!
//! This crate has no runtime logic and no dependency on any other workspace
//! member. Every other crate depends on it; it depends on nothing of its own.

pub mod agent;
pub mod error;
pub mod execution;
pub mod job;
pub mod plan;
pub mod stream;
pub mod task;
pub mod tool;
pub mod workflow;

pub use agent::{Agent, AgentStatus};
pub use error::{ErrorCode, ErrorDetail};
pub use execution::{JobExecution, JobExecutionStatus, LogEntry, StepResult, ToolCallRecord};
pub use job::{JobConfig, ScheduledJob, Schedule};
pub use plan::{
    ErrorHandlingPolicy, ExecutionPlan, InputSource, PlanEstimates, PlanStep, StepInput,
};
pub use stream::{ClientMessage, ServerMessage};
pub use task::{Task, TaskPhase, TaskPriority, TaskStatus};
pub use tool::{ToolCall, ToolDefinition, ToolPolicy, ToolResult};
pub use workflow::{
    DecisionBranch, NodeConfig, NodeExecutionRecord, ParallelWaitFor, TransformOp,
    WorkflowDefinition, WorkflowEdge, WorkflowExecution, WorkflowExecutionStatus, WorkflowNode,
};
