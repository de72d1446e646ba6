// Executes one `JobExecution` by dispatching on its owning job's `JobConfig`
// kind. Each arm returns the `result` value to persist on success; errors
// propagate to the caller, which records them on the execution row.

use std::sync::Arc;
use std::time::Duration;

use contracts::JobConfig;
use orchestrator::{NoopCallbacks as OrchestratorNoop, Orchestrator};
use serde_json::{json, Value};
use uuid::Uuid;
use workflow_engine::{NoopCallbacks as WorkflowNoop, WorkflowEngine};

use crate::error::{Result, SchedulerError};

/// The synthetic user id attached to tasks created by scheduled jobs (no
/// human user owns them).
pub const SYSTEM_USER_ID: Uuid = Uuid::nil();

pub async fn dispatch(
    config: &JobConfig,
    orchestrator: &Arc<Orchestrator>,
    workflow_engine: &Arc<WorkflowEngine>,
    http: &reqwest::Client,
) -> Result<Value> {
    match config {
        JobConfig::Task { message } => {
            let result = orchestrator.handle_message(message, SYSTEM_USER_ID, None, &OrchestratorNoop).await;
            if !result.success {
                return Err(SchedulerError::Command(
                    result.error.unwrap_or_else(|| "task execution failed".to_string()),
                ));
            }
            Ok(json!({
                "task_id": result.task_id,
                "summary": result.summary,
            }))
        }
        JobConfig::Workflow { workflow_id, input } => {
            let workflow = workflow_engine
                .database()
                .get_workflow(*workflow_id)
                .await?
                .ok_or(SchedulerError::JobNotFound(*workflow_id))?;
            let execution = workflow_engine.run(&workflow, input.clone(), &WorkflowNoop).await?;
            if execution.status == contracts::WorkflowExecutionStatus::Failed {
                let message = execution.error.map(|e| e.message).unwrap_or_else(|| "workflow failed".to_string());
                return Err(SchedulerError::Command(message));
            }
            Ok(json!({
                "execution_id": execution.id,
                "status": execution.status,
                "output": execution.output,
            }))
        }
        JobConfig::Webhook { url, method, headers, body } => {
            let method = reqwest::Method::from_bytes(method.as_bytes())
                .map_err(|_| SchedulerError::Webhook(format!("invalid method {method}")))?;
            let mut request = http.request(method, url);
            for (key, value) in headers {
                request = request.header(key, value);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await.map_err(|e| SchedulerError::Webhook(e.to_string()))?;
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(SchedulerError::Webhook(format!("status {status}: {body_text}")));
            }
            Ok(json!({ "status": status.as_u16(), "body": body_text }))
        }
        JobConfig::Command { command, args, cwd } => {
            let mut cmd = tokio::process::Command::new(command);
            cmd.args(args);
            if let Some(cwd) = cwd {
                cmd.current_dir(cwd);
            }
            let output = cmd.output().await.map_err(|e| SchedulerError::Command(e.to_string()))?;
            if !output.status.success() {
                return Err(SchedulerError::Command(format!(
                    "exit code {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                )));
            }
            Ok(json!({
                "stdout": String::from_utf8_lossy(&output.stdout),
                "stderr": String::from_utf8_lossy(&output.stderr),
            }))
        }
    }
}

/// Races `dispatch` against `timeout`, surfacing a dedicated timeout error
/// rather than propagating `tokio::time::error::Elapsed`.
pub async fn dispatch_with_timeout(
    config: &JobConfig,
    orchestrator: &Arc<Orchestrator>,
    workflow_engine: &Arc<WorkflowEngine>,
    http: &reqwest::Client,
    timeout: Duration,
) -> Result<Value> {
    match tokio::time::timeout(timeout, dispatch(config, orchestrator, workflow_engine, http)).await {
        Ok(result) => result,
        Err(_) => Err(SchedulerError::Timeout),
    }
}
