// Plan synthesis: turns a Task into a validated ExecutionPlan via a provider
// call with a strict JSON envelope, falling back to a single research step
// over the task's goal when the response can't be parsed or validated.

use std::sync::Arc;

use agent_loop::traits::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider};
use agent_loop::AgentRegistry;
use contracts::{ErrorHandlingPolicy, ExecutionPlan, PlanEstimates, PlanStep, Task};
use serde::Deserialize;

use crate::dag;
use crate::error::{PlannerError, Result};

const SYSTEM_PROMPT: &str = r#"You synthesize an execution plan for a task. Respond with a
single JSON object: {"steps": [{"id", "name", "description", "agent_id", "action_type",
"action_params", "depends_on", "timeout_ms", "max_retries", "requires_approval"}],
"default_error_handling": "abort"|"retry"|"skip"}. Every agent_id must be one of the
available agents. Respond with JSON only, no prose."#;

#[derive(Debug, Deserialize)]
struct RawStep {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    agent_id: String,
    #[serde(default = "default_action_type")]
    action_type: String,
    #[serde(default)]
    action_params: serde_json::Value,
    #[serde(default)]
    depends_on: Vec<String>,
    timeout_ms: Option<u64>,
    #[serde(default)]
    max_retries: u32,
    retry_delay_ms: Option<u64>,
    #[serde(default)]
    requires_approval: bool,
    approval_prompt: Option<String>,
}

fn default_action_type() -> String {
    "research".to_string()
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    steps: Vec<RawStep>,
    #[serde(default)]
    default_error_handling: ErrorHandlingPolicy,
}

/// The plan for a single research step over `goal`, used whenever the
/// provider's response can't be parsed or fails validation.
pub fn fallback_plan(task: &Task, version: u32) -> ExecutionPlan {
    let step = PlanStep {
        id: "research".to_string(),
        name: "Research".to_string(),
        description: format!("Research the goal: {}", task.goal),
        agent_id: "default_research_agent".to_string(),
        action_type: "research".to_string(),
        action_params: serde_json::json!({ "goal": task.goal }),
        inputs: Vec::new(),
        depends_on: Vec::new(),
        timeout_ms: None,
        max_retries: 0,
        retry_delay_ms: None,
        requires_approval: false,
        approval_prompt: None,
    };
    ExecutionPlan::new(task.id, version, vec![step])
}

/// Synthesize and validate a plan for `task`. Never fails: any provider
/// error, parse failure, or validation failure (unknown agent id, duplicate
/// id, unknown dependency, cycle) yields [`fallback_plan`] instead.
pub async fn synthesize_plan(
    provider: Arc<dyn LlmProvider>,
    agents: &AgentRegistry,
    task: &Task,
    version: u32,
) -> ExecutionPlan {
    match try_synthesize(provider, agents, task, version).await {
        Ok(plan) => plan,
        Err(_) => fallback_plan(task, version),
    }
}

async fn try_synthesize(
    provider: Arc<dyn LlmProvider>,
    agents: &AgentRegistry,
    task: &Task,
    version: u32,
) -> Result<ExecutionPlan> {
    let available_agents: Vec<&str> = agents.list().iter().map(|a| a.id.as_str()).collect();
    let user_prompt = format!(
        "Goal: {}\nConstraints: {:?}\nAvailable agents: {:?}",
        task.goal, task.constraints, available_agents
    );

    let messages = vec![
        LlmMessage {
            role: LlmMessageRole::System,
            content: SYSTEM_PROMPT.to_string(),
            tool_calls: None,
            tool_call_id: None,
        },
        LlmMessage {
            role: LlmMessageRole::User,
            content: user_prompt,
            tool_calls: None,
            tool_call_id: None,
        },
    ];
    let config = LlmCallConfig {
        model: provider.model_name().to_string(),
        temperature: Some(0.0),
        max_tokens: None,
        tools: Vec::new(),
    };

    let response = provider.chat_completion(messages, &config).await?;
    let raw = parse_envelope(&response.text)?;

    let steps: Vec<PlanStep> = raw
        .steps
        .into_iter()
        .map(|raw_step| PlanStep {
            id: raw_step.id,
            name: raw_step.name,
            description: raw_step.description,
            agent_id: raw_step.agent_id,
            action_type: raw_step.action_type,
            action_params: raw_step.action_params,
            inputs: Vec::new(),
            depends_on: raw_step.depends_on,
            timeout_ms: raw_step.timeout_ms,
            max_retries: raw_step.max_retries,
            retry_delay_ms: raw_step.retry_delay_ms,
            requires_approval: raw_step.requires_approval,
            approval_prompt: raw_step.approval_prompt,
        })
        .collect();

    for step in &steps {
        if !agents.contains(&step.agent_id) {
            return Err(PlannerError::UnknownAgent(step.agent_id.clone()));
        }
    }
    dag::validate(&steps)?;

    let mut plan = ExecutionPlan::new(task.id, version, steps);
    plan.default_error_handling = raw.default_error_handling;
    plan.estimates = PlanEstimates::default();
    Ok(plan)
}

fn parse_envelope(text: &str) -> Result<RawPlan> {
    let start = text.find('{').ok_or_else(|| PlannerError::ParseFailure("no JSON object found".to_string()))?;
    let end = text.rfind('}').ok_or_else(|| PlannerError::ParseFailure("no JSON object found".to_string()))?;
    if end < start {
        return Err(PlannerError::ParseFailure("malformed JSON span".to_string()));
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| PlannerError::ParseFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_loop::SimulatedProvider;
    use uuid::Uuid;

    fn sample_task() -> Task {
        Task::new(Uuid::now_v7(), "survey recent quantum sensing papers")
    }

    #[tokio::test]
    async fn unparseable_response_yields_fallback_plan() {
        let provider: Arc<dyn LlmProvider> = Arc::new(SimulatedProvider::default());
        let agents = AgentRegistry::with_builtins();
        let task = sample_task();

        let plan = synthesize_plan(provider, &agents, &task, 1).await;
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].agent_id, "default_research_agent");
        assert_eq!(plan.task_id, task.id);
    }

    #[test]
    fn fallback_plan_has_no_dependencies() {
        let task = sample_task();
        let plan = fallback_plan(&task, 1);
        assert!(plan.steps[0].depends_on.is_empty());
        assert_eq!(plan.version, 1);
    }
}
