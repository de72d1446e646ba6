// Frontier-based traversal over a `WorkflowDefinition`: repeatedly pop a node
// id off the frontier, dispatch it by type, and push whichever outgoing
// edges pass their guard condition. `parallel` and `loop` are the only node
// types that recurse into sub-node execution themselves (their branches/body
// are leaf invocations, not independent frontier members — see DESIGN.md for
// the Open Question this resolves).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use agent_loop::traits::{LlmCallConfig, LlmMessage, LlmMessageRole, LlmProvider};
use agent_loop::{AgentRegistry, CurrentTimeTool, EchoTool, HttpGetTool, SimulatedProvider, ToolRegistry};
use chrono::Utc;
use contracts::{
    DecisionBranch, NodeConfig, ParallelWaitFor, WorkflowDefinition, WorkflowEdge, WorkflowExecution,
    WorkflowExecutionStatus, WorkflowNode,
};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use storage::Database;
use uuid::Uuid;

use crate::callbacks::WorkflowCallbacks;
use crate::error::{Result, WorkflowEngineError};
use crate::interpolation::{interpolate, interpolate_value};
use crate::{expr, transform};

const MAX_TASK_ITERATIONS: usize = 5;
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const WAIT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

enum NodeOutcome {
    Advance(Value, Vec<String>),
    End,
    Waiting,
}

pub struct WorkflowEngine {
    db: Database,
    agents: AgentRegistry,
    tools: ToolRegistry,
    provider: Arc<dyn LlmProvider>,
    http: reqwest::Client,
}

impl WorkflowEngine {
    pub fn new(db: Database, agents: AgentRegistry, tools: ToolRegistry, provider: Arc<dyn LlmProvider>) -> Self {
        Self { db, agents, tools, provider, http: reqwest::Client::new() }
    }

    /// The builtin-tools/simulated-provider engine, wired the same way as
    /// `orchestrator::Orchestrator::with_defaults`.
    pub fn with_defaults(db: Database) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(EchoTool);
        tools.register(CurrentTimeTool);
        tools.register(HttpGetTool::default());
        Self::new(db, AgentRegistry::with_builtins(), tools, Arc::new(SimulatedProvider::default()))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run `workflow` from its start node against `input`, driving it to
    /// completion, failure, or a `waiting` pause.
    pub async fn run(
        &self,
        workflow: &WorkflowDefinition,
        input: Value,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Result<WorkflowExecution> {
        let mut variables = workflow.variables.clone();
        if let Value::Object(map) = &input {
            for (key, value) in map {
                variables.insert(key.clone(), value.clone());
            }
        }

        let start = workflow.start_node_id().ok_or(WorkflowEngineError::NoStartNode)?.to_string();
        let mut execution = WorkflowExecution::new(workflow.id, input, variables);
        execution.status = WorkflowExecutionStatus::Running;
        execution.current_nodes = [start].into_iter().collect();
        self.db.save_workflow_execution(&execution).await?;

        self.drive(workflow, &mut execution, callbacks).await?;
        Ok(execution)
    }

    /// Resume a `waiting` execution whose frontier includes a `human_input`
    /// node, supplying the value the host collected out of band.
    pub async fn resume_human_input(
        &self,
        workflow: &WorkflowDefinition,
        mut execution: WorkflowExecution,
        node_id: &str,
        value: Value,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Result<WorkflowExecution> {
        execution.current_nodes.remove(node_id);
        execution.variables.insert(node_id.to_string(), value);
        let next = self.advance_targets(workflow, node_id, &execution.variables)?;
        for target in next {
            execution.current_nodes.insert(target);
        }
        execution.status = WorkflowExecutionStatus::Running;
        self.drive(workflow, &mut execution, callbacks).await?;
        Ok(execution)
    }

    async fn drive(
        &self,
        workflow: &WorkflowDefinition,
        execution: &mut WorkflowExecution,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Result<()> {
        let mut frontier: VecDeque<String> = execution.current_nodes.drain().collect();

        while let Some(node_id) = frontier.pop_front() {
            let node = workflow.node(&node_id).ok_or_else(|| WorkflowEngineError::NodeNotFound(node_id.clone()))?;
            callbacks.on_node_started(execution.id, &node_id).await;
            let started_at = Utc::now();

            let outcome = self.dispatch(workflow, node, &mut execution.variables, execution.id, callbacks).await;

            match outcome {
                Ok(NodeOutcome::Advance(output, next_ids)) => {
                    execution.node_executions.push(contracts::NodeExecutionRecord {
                        node_id: node_id.clone(),
                        started_at,
                        completed_at: Some(Utc::now()),
                        output: Some(output.clone()),
                        error: None,
                    });
                    callbacks.on_node_completed(execution.id, &node_id, &output).await;
                    for next in next_ids {
                        if !frontier.contains(&next) {
                            frontier.push_back(next);
                        }
                    }
                }
                Ok(NodeOutcome::End) => {
                    execution.node_executions.push(contracts::NodeExecutionRecord {
                        node_id: node_id.clone(),
                        started_at,
                        completed_at: Some(Utc::now()),
                        output: None,
                        error: None,
                    });
                }
                Ok(NodeOutcome::Waiting) => {
                    execution.status = WorkflowExecutionStatus::Waiting;
                    execution.current_nodes.insert(node_id);
                    execution.current_nodes.extend(frontier.drain(..));
                    self.db.save_workflow_execution(execution).await?;
                    return Ok(());
                }
                Err(err) => {
                    execution.node_executions.push(contracts::NodeExecutionRecord {
                        node_id: node_id.clone(),
                        started_at,
                        completed_at: Some(Utc::now()),
                        output: None,
                        error: Some(err.to_error_detail()),
                    });
                    execution.status = WorkflowExecutionStatus::Failed;
                    execution.error = Some(err.to_error_detail());
                    execution.completed_at = Some(Utc::now());
                    self.db.save_workflow_execution(execution).await?;
                    callbacks.on_execution_failed(execution.id, &err.to_string()).await;
                    return Ok(());
                }
            }
        }

        execution.status = WorkflowExecutionStatus::Completed;
        execution.completed_at = Some(Utc::now());
        execution.output = Some(Value::Object(execution.variables.clone().into_iter().collect()));
        self.db.save_workflow_execution(execution).await?;
        callbacks.on_execution_completed(execution.id).await;
        Ok(())
    }

    // `parallel`/`loop` bodies recurse back into `dispatch` (a branch or loop
    // body can itself be a `parallel`/`loop` node), which would otherwise
    // give this async fn an infinite-sized state machine; boxing the future
    // breaks the cycle.
    fn dispatch<'a>(
        &'a self,
        workflow: &'a WorkflowDefinition,
        node: &'a WorkflowNode,
        variables: &'a mut HashMap<String, Value>,
        execution_id: Uuid,
        callbacks: &'a dyn WorkflowCallbacks,
    ) -> BoxFuture<'a, Result<NodeOutcome>> {
        Box::pin(async move { self.dispatch_inner(workflow, node, variables, execution_id, callbacks).await })
    }

    async fn dispatch_inner(
        &self,
        workflow: &WorkflowDefinition,
        node: &WorkflowNode,
        variables: &mut HashMap<String, Value>,
        execution_id: Uuid,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Result<NodeOutcome> {
        match &node.config {
            NodeConfig::Start => {
                let next = self.advance_targets(workflow, &node.id, variables)?;
                Ok(NodeOutcome::Advance(Value::Null, next))
            }
            NodeConfig::End => Ok(NodeOutcome::End),
            NodeConfig::Task { agent_id, task_template } => {
                let output = self.execute_task(agent_id, task_template, variables).await?;
                let recorded = serde_json::json!({ "task_result": output });
                variables.insert(node.id.clone(), recorded.clone());
                let next = self.advance_targets(workflow, &node.id, variables)?;
                Ok(NodeOutcome::Advance(recorded, next))
            }
            NodeConfig::Decision { branches, default_target } => {
                let target = evaluate_decision(branches, default_target, &node.id, variables)?;
                Ok(NodeOutcome::Advance(Value::String(target.clone()), vec![target]))
            }
            NodeConfig::Parallel { branches, wait_for } => {
                let outputs = self.execute_parallel(workflow, branches, *wait_for, variables, execution_id, callbacks).await?;
                let recorded = Value::Array(outputs);
                variables.insert(node.id.clone(), recorded.clone());
                let next = self.advance_targets(workflow, &node.id, variables)?;
                Ok(NodeOutcome::Advance(recorded, next))
            }
            NodeConfig::Loop { collection, iterator, body, max_iterations } => {
                let outputs =
                    self.execute_loop(workflow, collection, iterator, body, *max_iterations, variables, execution_id, callbacks)
                        .await?;
                let recorded = Value::Array(outputs);
                variables.insert(node.id.clone(), recorded.clone());
                let next = self.advance_targets(workflow, &node.id, variables)?;
                Ok(NodeOutcome::Advance(recorded, next))
            }
            NodeConfig::Wait { duration_ms, event, until } => {
                self.execute_wait(*duration_ms, event.as_deref(), until.as_deref(), variables, execution_id, callbacks).await?;
                let next = self.advance_targets(workflow, &node.id, variables)?;
                Ok(NodeOutcome::Advance(Value::Null, next))
            }
            NodeConfig::HumanInput { prompt, fields } => {
                let prompt_text = interpolate(prompt, variables);
                match callbacks.on_human_input(execution_id, &node.id, &prompt_text, fields).await {
                    Some(value) => {
                        variables.insert(node.id.clone(), value.clone());
                        let next = self.advance_targets(workflow, &node.id, variables)?;
                        Ok(NodeOutcome::Advance(value, next))
                    }
                    None => Ok(NodeOutcome::Waiting),
                }
            }
            NodeConfig::Webhook { url, method, headers, body_template } => {
                let output = self.execute_webhook(url, method, headers, body_template.as_ref(), variables).await?;
                variables.insert(node.id.clone(), output.clone());
                let next = self.advance_targets(workflow, &node.id, variables)?;
                Ok(NodeOutcome::Advance(output, next))
            }
            NodeConfig::Transform { operations } => {
                transform::apply(operations, variables)?;
                let next = self.advance_targets(workflow, &node.id, variables)?;
                Ok(NodeOutcome::Advance(Value::Null, next))
            }
        }
    }

    fn advance_targets(&self, workflow: &WorkflowDefinition, node_id: &str, variables: &HashMap<String, Value>) -> Result<Vec<String>> {
        let mut targets = Vec::new();
        for edge in workflow.outgoing(node_id) {
            if edge_passes(edge, variables)? {
                targets.push(edge.target.clone());
            }
        }
        Ok(targets)
    }

    async fn execute_task(&self, agent_id: &str, task_template: &str, variables: &HashMap<String, Value>) -> Result<String> {
        let agent = self.agents.get(agent_id).ok_or_else(|| WorkflowEngineError::AgentNotFound(agent_id.to_string()))?;
        let prompt = interpolate(task_template, variables);

        let tool_defs = agent.tool_names.iter().filter_map(|name| self.tools.definition(name)).collect::<Vec<_>>();
        let mut messages = vec![
            LlmMessage { role: LlmMessageRole::System, content: agent.system_prompt.clone(), tool_calls: None, tool_call_id: None },
            LlmMessage { role: LlmMessageRole::User, content: prompt, tool_calls: None, tool_call_id: None },
        ];
        let config = LlmCallConfig { model: self.provider.model_name().to_string(), temperature: None, max_tokens: None, tools: tool_defs };

        for _ in 0..MAX_TASK_ITERATIONS {
            let response = self.provider.chat_completion(messages.clone(), &config).await.map_err(WorkflowEngineError::Provider)?;

            let has_tool_calls = response.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty());
            if !has_tool_calls {
                return Ok(response.text);
            }

            let tool_calls = response.tool_calls.unwrap();
            messages.push(LlmMessage {
                role: LlmMessageRole::Assistant,
                content: response.text,
                tool_calls: Some(tool_calls.clone()),
                tool_call_id: None,
            });

            for tool_call in &tool_calls {
                let content = match self.tools.get(&tool_call.name) {
                    Some(tool) => match tool.execute(tool_call.arguments.clone()).await {
                        agent_loop::ToolExecutionResult::Success(value) => serde_json::to_string(&value).unwrap_or_default(),
                        agent_loop::ToolExecutionResult::ToolError(message) => format!("error: {message}"),
                        agent_loop::ToolExecutionResult::InternalError(err) => {
                            tracing::error!(error = %err, "tool internal error (details hidden from model)");
                            "error: an internal error occurred while executing the tool".to_string()
                        }
                    },
                    None => format!("error: tool not found: {}", tool_call.name),
                };
                messages.push(LlmMessage {
                    role: LlmMessageRole::Tool,
                    content,
                    tool_calls: None,
                    tool_call_id: Some(tool_call.id.clone()),
                });
            }
        }

        Err(WorkflowEngineError::Timeout(format!("task node exceeded {MAX_TASK_ITERATIONS} agent-loop iterations")))
    }

    async fn execute_parallel(
        &self,
        workflow: &WorkflowDefinition,
        branches: &[String],
        wait_for: ParallelWaitFor,
        variables: &mut HashMap<String, Value>,
        execution_id: Uuid,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Result<Vec<Value>> {
        let required = match wait_for {
            ParallelWaitFor::All => branches.len(),
            ParallelWaitFor::Any => 1.min(branches.len()),
            ParallelWaitFor::Count(n) => (n as usize).min(branches.len()),
        };

        let snapshot = variables.clone();
        let mut pending: FuturesUnordered<_> = branches
            .iter()
            .map(|branch_id| {
                let mut scope = snapshot.clone();
                async move {
                    let node = workflow.node(branch_id).ok_or_else(|| WorkflowEngineError::NodeNotFound(branch_id.clone()))?;
                    let outcome = self.dispatch(workflow, node, &mut scope, execution_id, callbacks).await?;
                    Ok::<_, WorkflowEngineError>((scope, outcome))
                }
            })
            .collect();

        let mut outputs = Vec::new();
        let mut last_error = None;

        while let Some(result) = pending.next().await {
            match result {
                Ok((scope, NodeOutcome::Advance(output, _))) => {
                    for (key, value) in scope {
                        variables.entry(key).or_insert(value);
                    }
                    outputs.push(output);
                }
                Ok((_, NodeOutcome::End)) => outputs.push(Value::Null),
                Ok((_, NodeOutcome::Waiting)) => {
                    last_error = Some(WorkflowEngineError::Unknown(
                        "a human_input node cannot be used as a parallel branch".to_string(),
                    ));
                }
                Err(err) => last_error = Some(err),
            }
            if outputs.len() >= required {
                break;
            }
        }

        if outputs.len() < required {
            return Err(last_error.unwrap_or_else(|| WorkflowEngineError::Unknown("parallel node did not reach wait_for".to_string())));
        }

        Ok(outputs)
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_loop(
        &self,
        workflow: &WorkflowDefinition,
        collection: &str,
        iterator: &str,
        body: &str,
        max_iterations: u32,
        variables: &mut HashMap<String, Value>,
        execution_id: Uuid,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Result<Vec<Value>> {
        let items = match variables.get(collection) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let node = workflow.node(body).ok_or_else(|| WorkflowEngineError::NodeNotFound(body.to_string()))?;

        let mut outputs = Vec::new();
        for item in items.into_iter().take(max_iterations as usize) {
            variables.insert(iterator.to_string(), item);
            match self.dispatch(workflow, node, variables, execution_id, callbacks).await? {
                NodeOutcome::Advance(output, _) => outputs.push(output),
                NodeOutcome::End => outputs.push(Value::Null),
                NodeOutcome::Waiting => {
                    return Err(WorkflowEngineError::Unknown("a human_input node cannot be used as a loop body".to_string()));
                }
            }
        }
        Ok(outputs)
    }

    async fn execute_wait(
        &self,
        duration_ms: Option<u64>,
        event: Option<&str>,
        until: Option<&str>,
        variables: &mut HashMap<String, Value>,
        execution_id: Uuid,
        callbacks: &dyn WorkflowCallbacks,
    ) -> Result<()> {
        if let Some(ms) = duration_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return Ok(());
        }

        if let Some(name) = event {
            let deadline = Instant::now() + WAIT_POLL_TIMEOUT;
            loop {
                if let Some(value) = callbacks.poll_event(execution_id, name).await {
                    variables.insert(format!("event:{name}"), value);
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(WorkflowEngineError::Timeout(format!("wait for event '{name}'")));
                }
                tokio::time::sleep(WAIT_POLL_INTERVAL).await;
            }
        }

        if let Some(condition) = until {
            let deadline = Instant::now() + WAIT_POLL_TIMEOUT;
            loop {
                if expr::evaluate_bool(condition, variables)? {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(WorkflowEngineError::Timeout(format!("wait until '{condition}'")));
                }
                tokio::time::sleep(WAIT_POLL_INTERVAL).await;
            }
        }

        Ok(())
    }

    async fn execute_webhook(
        &self,
        url: &str,
        method: &str,
        headers: &HashMap<String, String>,
        body_template: Option<&Value>,
        variables: &HashMap<String, Value>,
    ) -> Result<Value> {
        let resolved_url = interpolate(url, variables);
        let method = reqwest::Method::from_bytes(method.as_bytes()).unwrap_or(reqwest::Method::POST);
        let mut request = self.http.request(method, resolved_url);

        for (key, value) in headers {
            request = request.header(key, interpolate(value, variables));
        }
        if let Some(template) = body_template {
            request = request.json(&interpolate_value(template, variables));
        }

        let response = request.send().await.map_err(|e| WorkflowEngineError::Webhook(e.to_string()))?;
        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| WorkflowEngineError::Webhook(e.to_string()))?;
        let body: Value = serde_json::from_str(&body_text).unwrap_or(Value::String(body_text));

        Ok(serde_json::json!({ "status": status, "body": body }))
    }
}

fn evaluate_decision(
    branches: &[DecisionBranch],
    default_target: &Option<String>,
    node_id: &str,
    variables: &HashMap<String, Value>,
) -> Result<String> {
    for branch in branches {
        if expr::evaluate_bool(&branch.condition, variables)? {
            return Ok(branch.target.clone());
        }
    }
    default_target.clone().ok_or_else(|| WorkflowEngineError::NoMatchingBranch(node_id.to_string()))
}

fn edge_passes(edge: &WorkflowEdge, variables: &HashMap<String, Value>) -> Result<bool> {
    match &edge.condition {
        Some(condition) => expr::evaluate_bool(condition, variables),
        None => Ok(true),
    }
}
