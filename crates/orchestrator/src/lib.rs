// Task lifecycle orchestration.
//
// `Orchestrator::handle_message` is the single entry point: classify intent,
// then either answer directly (simple query), ask for clarification, or
// build and run a plan. Plan execution, step retries/timeouts, input
// resolution and cancellation are implemented in sibling modules; this file
// wires them together and owns the Task's persisted lifecycle.

pub mod callbacks;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod inputs;
pub mod plan;
pub mod step;

pub use callbacks::{NoopCallbacks, OrchestratorCallbacks};
pub use cancellation::CancellationToken;
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use agent_loop::traits::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider};
use agent_loop::{AgentRegistry, CurrentTimeTool, EchoTool, HttpGetTool, ToolRegistry};
use contracts::{StepResult, Task, TaskPhase, TaskStatus};
use planner::IntentType;
use serde::Serialize;
use storage::Database;
use tracing::info;
use uuid::Uuid;

/// The result of handling one inbound message, mirroring the shape of the
/// `POST /api/tasks` response: a task-less answer (clarification/simple
/// query) has `task_id: None`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub task_id: Option<Uuid>,
    pub success: bool,
    pub summary: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

pub struct Orchestrator {
    db: Database,
    agents: AgentRegistry,
    tools: ToolRegistry,
    provider: Arc<dyn LlmProvider>,
    config: OrchestratorConfig,
    running: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl Orchestrator {
    pub fn new(
        db: Database,
        agents: AgentRegistry,
        tools: ToolRegistry,
        provider: Arc<dyn LlmProvider>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { db, agents, tools, provider, config, running: Mutex::new(HashMap::new()) }
    }

    /// A ready-to-run orchestrator over the built-in agents, built-in tools,
    /// and the in-memory simulated provider — the zero-config development
    /// default described in the provider abstraction's Non-goals.
    pub fn with_defaults(db: Database) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        tools.register(CurrentTimeTool);
        tools.register(HttpGetTool::default());

        Self::new(
            db,
            AgentRegistry::with_builtins(),
            tools,
            Arc::new(agent_loop::SimulatedProvider::default()),
            OrchestratorConfig::from_env(),
        )
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Currently-running task count — the `agents.active` proxy in
    /// `/api/stats` (see DESIGN.md's Open Question decision on this field).
    pub fn running_task_count(&self) -> usize {
        self.running.lock().unwrap().len()
    }

    /// Cooperatively cancel a running task. Returns `false` if no task with
    /// that id is currently executing.
    pub fn cancel_task(&self, task_id: Uuid) -> bool {
        match self.running.lock().unwrap().get(&task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn handle_message(
        &self,
        message: &str,
        user_id: Uuid,
        language: Option<&str>,
        callbacks: &dyn OrchestratorCallbacks,
    ) -> ExecutionResult {
        let started = Instant::now();
        info!(%user_id, "analyzing intent");

        let analysis = planner::classify_intent(Arc::clone(&self.provider), message).await;

        match analysis.intent_type {
            IntentType::ClarificationNeeded => {
                let summary = if analysis.clarification_questions.is_empty() {
                    "Could you clarify your request?".to_string()
                } else {
                    analysis.clarification_questions.join(" ")
                };
                ExecutionResult {
                    task_id: None,
                    success: true,
                    summary: Some(summary),
                    error: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
            IntentType::SimpleQuery => {
                let summary = self.answer_simple_query(message, language).await;
                ExecutionResult {
                    task_id: None,
                    success: true,
                    summary: Some(summary),
                    error: None,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
            }
            IntentType::Task => {
                let result = self.run_task(&analysis.primary_goal, user_id, language, callbacks).await;
                ExecutionResult { duration_ms: started.elapsed().as_millis() as u64, ..result }
            }
        }
    }

    async fn answer_simple_query(&self, message: &str, language: Option<&str>) -> String {
        let system_prompt = match language {
            Some(lang) => {
                format!("You are a helpful assistant. Respond in {lang}. Keep the reply short and conversational.")
            }
            None => "You are a helpful assistant. Keep the reply short and conversational.".to_string(),
        };
        let messages = vec![
            LlmMessage { role: LlmMessageRole::System, content: system_prompt, tool_calls: None, tool_call_id: None },
            LlmMessage { role: LlmMessageRole::User, content: message.to_string(), tool_calls: None, tool_call_id: None },
        ];
        let config = LlmCallConfig {
            model: self.provider.model_name().to_string(),
            temperature: Some(0.7),
            max_tokens: None,
            tools: Vec::new(),
        };

        match self.provider.chat_completion(messages, &config).await {
            Ok(response) => response.text,
            Err(err) => {
                tracing::warn!(error = %err, "simple query provider call failed");
                "I wasn't able to answer that right now.".to_string()
            }
        }
    }

    /// Creates, plans and executes a task end to end. Never panics on a
    /// downstream failure: any error is captured into a `Failed` task and an
    /// `error_logs` row rather than propagated.
    async fn run_task(
        &self,
        goal: &str,
        user_id: Uuid,
        language: Option<&str>,
        callbacks: &dyn OrchestratorCallbacks,
    ) -> ExecutionResult {
        let mut task = Task::new(user_id, goal);
        if let Some(lang) = language {
            task.context.insert("language".to_string(), serde_json::json!(lang));
        }

        if let Err(err) = self.db.save_task(&task).await {
            return self.fail_before_start(task.id, err.to_string()).await;
        }

        let token = CancellationToken::new();
        self.running.lock().unwrap().insert(task.id, token.clone());
        callbacks.on_task_started(task.id).await;

        let outcome = self.run_task_inner(&mut task, &token, callbacks).await;

        self.running.lock().unwrap().remove(&task.id);

        match outcome {
            Ok((success, summary, error)) => {
                if token.is_cancelled() {
                    callbacks.on_cancelled(task.id).await;
                } else if success {
                    callbacks.on_task_completed(task.id, summary.as_deref().unwrap_or_default()).await;
                } else if let Some(err) = &error {
                    callbacks.on_task_error(task.id, err).await;
                }
                ExecutionResult { task_id: Some(task.id), success, summary, error, duration_ms: 0 }
            }
            Err(err) => {
                let message = err.to_string();
                let _ = self.db.record_error(Some(task.id), &message, None).await;
                let _ = self
                    .db
                    .update_task_status(
                        task.id,
                        &TaskStatus { phase: TaskPhase::Failed, progress: task.status.progress },
                        None,
                        Some(&message),
                    )
                    .await;
                callbacks.on_task_error(task.id, &message).await;
                ExecutionResult {
                    task_id: Some(task.id),
                    success: false,
                    summary: None,
                    error: Some(message),
                    duration_ms: 0,
                }
            }
        }
    }

    async fn run_task_inner(
        &self,
        task: &mut Task,
        token: &CancellationToken,
        callbacks: &dyn OrchestratorCallbacks,
    ) -> Result<(bool, Option<String>, Option<String>)> {
        let plan = planner::synthesize_plan(Arc::clone(&self.provider), &self.agents, task, 1).await;
        self.db.save_plan(&plan).await?;

        task.status = TaskStatus { phase: TaskPhase::Executing, progress: 0.0 };
        self.db.update_task_status(task.id, &task.status, None, None).await?;

        let outcome = plan::execute_plan(
            &plan,
            &self.agents,
            &self.tools,
            Arc::clone(&self.provider),
            &self.db,
            task.id,
            &task.context,
            self.config.max_concurrent_steps,
            callbacks,
            token,
        )
        .await?;

        if token.is_cancelled() || outcome.cancelled {
            task.status = TaskStatus { phase: TaskPhase::Failed, progress: progress(&outcome.results, &plan) };
            self.db.update_task_status(task.id, &task.status, None, Some("cancelled")).await?;
            return Ok((false, None, Some("cancelled".to_string())));
        }

        if outcome.aborted {
            let error = first_failure_message(&outcome.results).unwrap_or_else(|| "plan aborted".to_string());
            task.status = TaskStatus { phase: TaskPhase::Failed, progress: progress(&outcome.results, &plan) };
            self.db.update_task_status(task.id, &task.status, None, Some(&error)).await?;
            return Ok((false, None, Some(error)));
        }

        let summary = summarize(&outcome.results);
        task.status = TaskStatus { phase: TaskPhase::Completed, progress: 1.0 };
        self.db.update_task_status(task.id, &task.status, Some(&summary), None).await?;
        Ok((true, Some(summary), None))
    }

    async fn fail_before_start(&self, task_id: Uuid, message: String) -> ExecutionResult {
        let _ = self.db.record_error(Some(task_id), &message, None).await;
        ExecutionResult { task_id: Some(task_id), success: false, summary: None, error: Some(message), duration_ms: 0 }
    }
}

fn progress(results: &[StepResult], plan: &contracts::ExecutionPlan) -> f32 {
    let total = plan.steps.len().max(1) as f32;
    results.len() as f32 / total
}

fn first_failure_message(results: &[StepResult]) -> Option<String> {
    results
        .iter()
        .find(|r| !r.success)
        .and_then(|r| r.error.as_ref())
        .map(|e| e.message.clone())
}

/// Concatenates, in step order, any `summary` field from a success output, or
/// the first five entries of a `findings` array when present.
fn summarize(results: &[StepResult]) -> String {
    let mut parts = Vec::new();
    for result in results {
        if !result.success {
            continue;
        }
        let Some(output) = &result.output else { continue };

        if let Some(summary) = output.get("summary").and_then(|v| v.as_str()) {
            parts.push(summary.to_string());
        } else if let Some(findings) = output.get("findings").and_then(|v| v.as_array()) {
            for entry in findings.iter().take(5) {
                parts.push(entry.as_str().map(str::to_string).unwrap_or_else(|| entry.to_string()));
            }
        }
    }

    if parts.is_empty() {
        "Task completed with no summarized output.".to_string()
    } else {
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_query_returns_no_task_id() {
        let db = Database::in_memory().await.unwrap();
        let orchestrator = Orchestrator::with_defaults(db);
        let result = orchestrator
            .handle_message("hi there", Uuid::now_v7(), None, &NoopCallbacks)
            .await;
        assert!(result.task_id.is_none());
        assert!(result.success);
    }

    #[tokio::test]
    async fn unparseable_intent_falls_back_to_task_and_completes() {
        // SimulatedProvider never emits valid JSON, so classify_intent falls
        // back to IntentType::Task for every message.
        let db = Database::in_memory().await.unwrap();
        let orchestrator = Orchestrator::with_defaults(db);
        let result = orchestrator
            .handle_message("survey recent sensing papers", Uuid::now_v7(), None, &NoopCallbacks)
            .await;

        assert!(result.task_id.is_some());
        assert!(result.success);
        let task = orchestrator.database().get_task(result.task_id.unwrap()).await.unwrap().unwrap();
        assert_eq!(task.status.phase, TaskPhase::Completed);
    }

    #[tokio::test]
    async fn cancel_task_on_unknown_id_returns_false() {
        let db = Database::in_memory().await.unwrap();
        let orchestrator = Orchestrator::with_defaults(db);
        assert!(!orchestrator.cancel_task(Uuid::now_v7()));
    }

    #[test]
    fn summarize_prefers_summary_field_over_findings() {
        let mut result = StepResult::success(
            "s1",
            serde_json::json!({ "summary": "done", "findings": ["a", "b"] }),
            chrono::Utc::now(),
        );
        result.success = true;
        assert_eq!(summarize(std::slice::from_ref(&result)), "done");
    }

    #[test]
    fn summarize_falls_back_to_first_five_findings() {
        let result = StepResult::success(
            "s1",
            serde_json::json!({ "findings": ["a", "b", "c", "d", "e", "f"] }),
            chrono::Utc::now(),
        );
        assert_eq!(summarize(&[result]), "a\nb\nc\nd\ne");
    }
}
