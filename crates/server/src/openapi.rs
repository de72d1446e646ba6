// Aggregated OpenAPI document, mirroring everruns-api's single `ApiDoc`
// derive that lists every handler and schema the router exposes.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health,
        crate::auth::auth_token,
        crate::routes::tasks::create_task,
        crate::routes::tasks::list_tasks,
        crate::routes::tasks::get_task,
        crate::routes::tasks::cancel_task,
        crate::routes::stats::stats,
        crate::routes::scheduler::create_job,
        crate::routes::scheduler::list_jobs,
        crate::routes::scheduler::get_job,
        crate::routes::scheduler::update_job,
        crate::routes::scheduler::delete_job,
        crate::routes::scheduler::toggle_job,
        crate::routes::scheduler::job_executions,
        crate::routes::scheduler::run_job,
        crate::routes::workflows::create_workflow,
        crate::routes::workflows::list_workflows,
        crate::routes::workflows::get_workflow,
        crate::routes::workflows::update_workflow,
        crate::routes::workflows::delete_workflow,
        crate::routes::workflows::execute_workflow,
        crate::routes::workflows::workflow_executions,
        crate::routes::workflows::workflow_templates,
        crate::routes::agents::list_agents,
    ),
    components(schemas(
        crate::routes::health::HealthResponse,
        crate::auth::TokenRequest,
        crate::auth::TokenResponse,
        crate::routes::tasks::CreateTaskRequest,
        crate::routes::tasks::CreateTaskResponse,
        contracts::Task,
        contracts::TaskStatus,
        contracts::TaskPhase,
        contracts::TaskPriority,
        crate::routes::stats::StatsResponse,
        crate::routes::stats::TaskStats,
        crate::routes::stats::MemoryStats,
        crate::routes::stats::AgentStats,
        crate::routes::stats::SchedulerStats,
        crate::routes::stats::WorkflowStats,
        crate::routes::scheduler::CreateJobRequest,
        crate::routes::scheduler::UpdateJobRequest,
        crate::routes::scheduler::ToggleJobRequest,
        contracts::ScheduledJob,
        contracts::Schedule,
        contracts::JobConfig,
        contracts::JobExecution,
        contracts::JobExecutionStatus,
        crate::routes::workflows::CreateWorkflowRequest,
        crate::routes::workflows::UpdateWorkflowRequest,
        crate::routes::workflows::ExecuteWorkflowRequest,
        contracts::WorkflowDefinition,
        contracts::WorkflowNode,
        contracts::WorkflowEdge,
        contracts::NodeConfig,
        contracts::DecisionBranch,
        contracts::ParallelWaitFor,
        contracts::TransformOp,
        contracts::WorkflowExecution,
        contracts::WorkflowExecutionStatus,
        contracts::NodeExecutionRecord,
        crate::routes::agents::AgentSummary,
        contracts::AgentStatus,
        contracts::ClientMessage,
        contracts::ServerMessage,
        contracts::ErrorDetail,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Bearer token issuance"),
        (name = "tasks", description = "Task submission and lifecycle"),
        (name = "stats", description = "Deployment statistics"),
        (name = "scheduler", description = "Cron/interval/once job scheduling"),
        (name = "workflows", description = "Workflow definitions and executions"),
        (name = "agents", description = "Registered agents"),
    ),
    info(title = "Meridian API", description = "Multi-agent orchestration backend", version = "0.1.0")
)]
pub struct ApiDoc;
