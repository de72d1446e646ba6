// Drives one plan step through its assigned agent: build a prompt from the
// step and its resolved inputs, call the provider, execute any requested
// tools, and repeat until the model stops asking for tools or the iteration
// cap is hit. Wraps the whole thing in a timeout and a fixed-delay retry.
//
// This mirrors the agent-loop crate's iterate-call-tools-repeat shape
// (`agent_loop::executor::AgentLoop::run`), but is driven directly here
// rather than through that generic session/message-store abstraction: a
// plan step has no conversation history to persist, only a StepResult to
// produce.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agent_loop::traits::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider};
use agent_loop::{AgentRegistry, ToolRegistry};
use chrono::Utc;
use contracts::{ErrorDetail, LogEntry, PlanStep, StepResult, ToolCallRecord};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::callbacks::OrchestratorCallbacks;
use crate::cancellation::CancellationToken;
use crate::error::{OrchestratorError, Result};

const MAX_ITERATIONS: usize = 10;
const DEFAULT_STEP_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

pub struct StepExecutor<'a> {
    pub agents: &'a AgentRegistry,
    pub tools: &'a ToolRegistry,
    pub provider: Arc<dyn LlmProvider>,
}

impl<'a> StepExecutor<'a> {
    /// Runs `step` to completion, retrying up to `step.max_retries` times on
    /// failure or timeout. Always returns a `StepResult`; retry/timeout
    /// exhaustion is reported as a failed result, not an `Err`.
    pub async fn execute(
        &self,
        step: &PlanStep,
        resolved_inputs: &Value,
        cancel: &CancellationToken,
        task_id: Uuid,
        callbacks: &dyn OrchestratorCallbacks,
    ) -> StepResult {
        let timeout_ms = step.timeout_ms.unwrap_or(DEFAULT_STEP_TIMEOUT_MS);
        let retry_delay_ms = step.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS);
        let max_attempts = step.max_retries + 1;

        let mut last_error: Option<OrchestratorError> = None;

        for attempt in 0..max_attempts {
            if cancel.is_cancelled() {
                return StepResult::failure(step.id.clone(), OrchestratorError::Cancelled.to_error_detail(), Utc::now());
            }

            let started_at = Utc::now();
            let outcome = tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.run_agent_loop(step, resolved_inputs, task_id, callbacks),
            )
            .await;

            match outcome {
                Ok(Ok((output, logs, tool_calls))) => {
                    let mut result = StepResult::success(step.id.clone(), output, started_at);
                    result.logs = logs;
                    result.tool_calls = tool_calls;
                    return result;
                }
                Ok(Err(err)) => {
                    warn!(step_id = %step.id, attempt, error = %err, "step attempt failed");
                    last_error = Some(err);
                }
                Err(_elapsed) => {
                    warn!(step_id = %step.id, attempt, timeout_ms, "step attempt timed out");
                    last_error = Some(OrchestratorError::Timeout(timeout_ms));
                }
            }

            if attempt + 1 < max_attempts {
                callbacks
                    .on_log(task_id, "warn", &format!("retrying step {} (attempt {})", step.id, attempt + 2))
                    .await;
                tokio::time::sleep(Duration::from_millis(retry_delay_ms)).await;
            }
        }

        let error = last_error.unwrap_or(OrchestratorError::Unknown("step failed with no recorded error".to_string()));
        StepResult::failure(step.id.clone(), error.to_error_detail(), Utc::now())
    }

    async fn run_agent_loop(
        &self,
        step: &PlanStep,
        resolved_inputs: &Value,
        task_id: Uuid,
        callbacks: &dyn OrchestratorCallbacks,
    ) -> Result<(Value, Vec<LogEntry>, Vec<ToolCallRecord>)> {
        let agent = self
            .agents
            .get(&step.agent_id)
            .ok_or_else(|| OrchestratorError::AgentNotFound(step.agent_id.clone()))?;

        let prompt = build_prompt(step, resolved_inputs);
        let tool_defs = agent
            .tool_names
            .iter()
            .filter_map(|name| self.tools.definition(name))
            .collect::<Vec<_>>();

        let mut messages = vec![
            LlmMessage {
                role: LlmMessageRole::System,
                content: agent.system_prompt.clone(),
                tool_calls: None,
                tool_call_id: None,
            },
            LlmMessage { role: LlmMessageRole::User, content: prompt, tool_calls: None, tool_call_id: None },
        ];

        let config = LlmCallConfig {
            model: self.provider.model_name().to_string(),
            temperature: None,
            max_tokens: None,
            tools: tool_defs,
        };

        let mut logs = Vec::new();
        let mut tool_calls_record = Vec::new();

        for iteration in 1..=MAX_ITERATIONS {
            let message = format!("[{}] iteration {}", agent.name, iteration);
            logs.push(LogEntry::info(message.clone()));
            callbacks.on_log(task_id, "info", &message).await;
            info!(step_id = %step.id, agent = %agent.name, iteration, "calling provider");

            let response = self.provider.chat_completion(messages.clone(), &config).await?;

            let has_tool_calls = response.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty());
            if !has_tool_calls {
                let output = serde_json::json!({ "output": response.text });
                return Ok((output, logs, tool_calls_record));
            }

            let tool_calls = response.tool_calls.unwrap();
            messages.push(LlmMessage {
                role: LlmMessageRole::Assistant,
                content: response.text,
                tool_calls: Some(tool_calls.clone()),
                tool_call_id: None,
            });

            for tool_call in &tool_calls {
                callbacks.on_tool_call(task_id, &tool_call.name, &tool_call.arguments).await;
                let call_started = Instant::now();
                let timestamp = Utc::now();

                let (output, error) = match self.tools.get(&tool_call.name) {
                    Some(tool) => match tool.execute(tool_call.arguments.clone()).await {
                        agent_loop::ToolExecutionResult::Success(value) => (Some(value), None),
                        agent_loop::ToolExecutionResult::ToolError(message) => (None, Some(message)),
                        agent_loop::ToolExecutionResult::InternalError(err) => {
                            (None, Some("an internal error occurred while executing the tool".to_string()))
                                .tap_log(&err)
                        }
                    },
                    None => (None, Some(format!("tool not found: {}", tool_call.name))),
                };

                tool_calls_record.push(ToolCallRecord {
                    tool_name: tool_call.name.clone(),
                    input: tool_call.arguments.clone(),
                    output: output.clone(),
                    error: error.clone(),
                    duration_ms: call_started.elapsed().as_millis() as u64,
                    timestamp,
                });

                let content = match (&output, &error) {
                    (_, Some(err)) => format!("error: {}", err),
                    (Some(value), None) => serde_json::to_string(value).unwrap_or_default(),
                    (None, None) => String::new(),
                };
                messages.push(LlmMessage {
                    role: LlmMessageRole::Tool,
                    content,
                    tool_calls: None,
                    tool_call_id: Some(tool_call.id.clone()),
                });
            }
        }

        Err(OrchestratorError::MaxIterations)
    }
}

fn build_prompt(step: &PlanStep, resolved_inputs: &Value) -> String {
    format!(
        "Task: {}\nAction: {}\nInputs: {}",
        step.description, step.action_type, resolved_inputs
    )
}

trait TapLog {
    fn tap_log(self, err: &dyn std::error::Error) -> Self;
}

impl TapLog for (Option<Value>, Option<String>) {
    fn tap_log(self, err: &dyn std::error::Error) -> Self {
        tracing::error!(error = %err, "tool internal error (details hidden from model)");
        self
    }
}
