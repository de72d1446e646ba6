// Plan-level execution: partitions a plan into parallel groups (via the
// planner's DAG layering) and runs each group's steps concurrently, subject
// to a semaphore bound, in dependency order across groups.

use std::collections::HashMap;
use std::sync::Arc;

use agent_loop::traits::LlmProvider;
use agent_loop::{AgentRegistry, ToolRegistry};
use chrono::Utc;
use contracts::{ErrorHandlingPolicy, ExecutionPlan, StepResult};
use serde_json::Value;
use storage::Database;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::callbacks::OrchestratorCallbacks;
use crate::cancellation::CancellationToken;
use crate::error::{OrchestratorError, Result};
use crate::inputs::resolve_inputs;
use crate::step::StepExecutor;

/// The outcome of running a full plan: every `StepResult` produced, in the
/// order their groups executed, plus whether the plan was aborted before
/// every step ran (either by an `abort`/`retry` policy failure or by
/// cancellation).
pub struct PlanOutcome {
    pub results: Vec<StepResult>,
    pub aborted: bool,
    pub cancelled: bool,
}

/// Execute every step of `plan`, persisting each `StepResult` as it lands and
/// reporting progress via `callbacks`. `context` seeds the task-context input
/// source available to every step.
#[allow(clippy::too_many_arguments)]
pub async fn execute_plan(
    plan: &ExecutionPlan,
    agents: &AgentRegistry,
    tools: &ToolRegistry,
    provider: Arc<dyn LlmProvider>,
    db: &Database,
    task_id: Uuid,
    context: &HashMap<String, Value>,
    max_concurrent_steps: usize,
    callbacks: &dyn OrchestratorCallbacks,
    cancel: &CancellationToken,
) -> Result<PlanOutcome> {
    let groups = planner::parallel_groups(&plan.steps)
        .map_err(|e| OrchestratorError::PlanningError(e.to_string()))?;
    let total_steps = plan.steps.len().max(1);

    let semaphore = Arc::new(Semaphore::new(max_concurrent_steps.max(1)));
    let executor = Arc::new(StepExecutor { agents, tools, provider });

    let mut results: Vec<StepResult> = Vec::with_capacity(plan.steps.len());
    let mut previous_outputs: HashMap<String, Value> = HashMap::new();
    let mut completed = 0usize;
    let mut aborted = false;

    'groups: for group in &groups {
        if cancel.is_cancelled() {
            return Ok(PlanOutcome { results, aborted: true, cancelled: true });
        }

        // Each step in the group is run as an independent future bounded by
        // the shared semaphore; `join_all` polls them concurrently without
        // requiring `'static` futures, so the live `callbacks` reference can
        // be shared across the whole group.
        let step_futures = group.iter().map(|step_id| {
            let step = plan.step(step_id).expect("parallel_groups only yields ids present in the plan");
            let executor = Arc::clone(&executor);
            let semaphore = Arc::clone(&semaphore);
            let resolved = resolve_inputs(step, &previous_outputs, context);

            async move {
                let inputs = match resolved {
                    Ok(value) => value,
                    Err(err) => {
                        return StepResult::failure(step.id.clone(), err.to_error_detail(), Utc::now());
                    }
                };
                let _permit = semaphore.acquire().await.expect("semaphore is never closed");
                executor.execute(step, &inputs, cancel, task_id, callbacks).await
            }
        });
        let group_results = futures::future::join_all(step_futures).await;

        for result in group_results {
            db.save_step_result(task_id, &result).await?;

            completed += 1;
            callbacks
                .on_progress(task_id, completed as f32 / total_steps as f32, Some(result.step_id.as_str()))
                .await;

            if result.success {
                if let Some(output) = &result.output {
                    previous_outputs.insert(result.step_id.clone(), output.clone());
                }
            } else {
                let should_abort = matches!(
                    plan.default_error_handling,
                    ErrorHandlingPolicy::Abort | ErrorHandlingPolicy::Retry
                );
                results.push(result);
                if should_abort {
                    aborted = true;
                    break 'groups;
                }
                continue;
            }

            results.push(result);
        }
    }

    Ok(PlanOutcome { results, aborted, cancelled: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_loop::SimulatedProvider;
    use contracts::{PlanStep, Task};

    fn step(id: &str, depends_on: &[&str]) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            name: id.to_string(),
            description: format!("describe {id}"),
            agent_id: "default_research_agent".to_string(),
            action_type: "research".to_string(),
            action_params: serde_json::Value::Null,
            inputs: Vec::new(),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
            timeout_ms: None,
            max_retries: 0,
            retry_delay_ms: None,
            requires_approval: false,
            approval_prompt: None,
        }
    }

    #[tokio::test]
    async fn diamond_plan_runs_every_step_and_persists_results() {
        let db = Database::in_memory().await.unwrap();
        let agents = AgentRegistry::with_builtins();
        let tools = ToolRegistry::new();
        let provider: Arc<dyn LlmProvider> = Arc::new(SimulatedProvider::default());
        let task = Task::new(Uuid::now_v7(), "diamond");

        let steps = vec![step("a", &[]), step("b", &["a"]), step("c", &["a"]), step("d", &["b", "c"])];
        let plan = ExecutionPlan::new(task.id, 1, steps);

        let outcome = execute_plan(
            &plan,
            &agents,
            &tools,
            provider,
            &db,
            task.id,
            &HashMap::new(),
            3,
            &crate::callbacks::NoopCallbacks,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.results.len(), 4);
        assert!(!outcome.aborted);
        assert!(outcome.results.iter().all(|r| r.success));

        let persisted = db.get_step_results(task.id).await.unwrap();
        assert_eq!(persisted.len(), 4);
    }

    #[tokio::test]
    async fn cancellation_before_a_group_starts_stops_the_plan() {
        let db = Database::in_memory().await.unwrap();
        let agents = AgentRegistry::with_builtins();
        let tools = ToolRegistry::new();
        let provider: Arc<dyn LlmProvider> = Arc::new(SimulatedProvider::default());
        let task = Task::new(Uuid::now_v7(), "cancel me");

        let steps = vec![step("a", &[]), step("b", &["a"])];
        let plan = ExecutionPlan::new(task.id, 1, steps);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = execute_plan(
            &plan,
            &agents,
            &tools,
            provider,
            &db,
            task.id,
            &HashMap::new(),
            3,
            &crate::callbacks::NoopCallbacks,
            &cancel,
        )
        .await
        .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.results.is_empty());
    }
}
