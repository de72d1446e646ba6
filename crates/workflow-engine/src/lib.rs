// Node-graph workflow execution: traverses a `contracts::WorkflowDefinition`
// from its start node to completion (or a `human_input`/`wait.event` pause),
// dispatching each of the ten node types and threading a per-execution
// variables map between them.

pub mod callbacks;
pub mod engine;
pub mod error;
pub mod expr;
pub mod interpolation;
pub mod transform;

pub use callbacks::{NoopCallbacks, WorkflowCallbacks};
pub use engine::WorkflowEngine;
pub use error::{Result, WorkflowEngineError};

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        DecisionBranch, NodeConfig, ParallelWaitFor, TransformOp, WorkflowDefinition, WorkflowEdge, WorkflowExecutionStatus,
        WorkflowNode,
    };
    use std::collections::HashMap;
    use storage::Database;
    use uuid::Uuid;

    fn node(id: &str, config: NodeConfig) -> WorkflowNode {
        WorkflowNode { id: id.to_string(), config }
    }

    fn edge(id: &str, source: &str, target: &str) -> WorkflowEdge {
        WorkflowEdge { id: id.to_string(), source: source.to_string(), target: target.to_string(), condition: None }
    }

    fn workflow_with(nodes: Vec<WorkflowNode>, edges: Vec<WorkflowEdge>) -> WorkflowDefinition {
        let now = chrono::Utc::now();
        WorkflowDefinition {
            id: Uuid::now_v7(),
            name: "test".to_string(),
            version: 1,
            input_schema: serde_json::Value::Null,
            nodes,
            edges,
            variables: HashMap::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn straight_line_start_task_end_completes() {
        let db = Database::in_memory().await.unwrap();
        let engine = WorkflowEngine::with_defaults(db);

        let workflow = workflow_with(
            vec![
                node("start", NodeConfig::Start),
                node("do", NodeConfig::Task { agent_id: "default_research_agent".to_string(), task_template: "look into ${topic}".to_string() }),
                node("end", NodeConfig::End),
            ],
            vec![edge("e1", "start", "do"), edge("e2", "do", "end")],
        );

        let execution = engine
            .run(&workflow, serde_json::json!({ "topic": "rust" }), &NoopCallbacks)
            .await
            .unwrap();

        assert_eq!(execution.status, WorkflowExecutionStatus::Completed);
        assert_eq!(execution.node_executions.len(), 3);
        assert!(execution.variables.contains_key("do"));
    }

    #[tokio::test]
    async fn decision_routes_to_the_first_matching_branch() {
        let db = Database::in_memory().await.unwrap();
        let engine = WorkflowEngine::with_defaults(db);

        let workflow = workflow_with(
            vec![
                node("start", NodeConfig::Start),
                node(
                    "route",
                    NodeConfig::Decision {
                        branches: vec![DecisionBranch { condition: "tier == \"gold\"".to_string(), target: "vip".to_string() }],
                        default_target: Some("standard".to_string()),
                    },
                ),
                node("vip", NodeConfig::End),
                node("standard", NodeConfig::End),
            ],
            vec![edge("e1", "start", "route")],
        );

        let execution = engine.run(&workflow, serde_json::json!({ "tier": "gold" }), &NoopCallbacks).await.unwrap();
        assert_eq!(execution.status, WorkflowExecutionStatus::Completed);
        assert!(execution.node_executions.iter().any(|n| n.node_id == "vip"));

        let fallback = engine.run(&workflow, serde_json::json!({ "tier": "bronze" }), &NoopCallbacks).await.unwrap();
        assert!(fallback.node_executions.iter().any(|n| n.node_id == "standard"));
    }

    #[tokio::test]
    async fn decision_with_no_match_and_no_default_fails() {
        let db = Database::in_memory().await.unwrap();
        let engine = WorkflowEngine::with_defaults(db);

        let workflow = workflow_with(
            vec![
                node("start", NodeConfig::Start),
                node(
                    "route",
                    NodeConfig::Decision {
                        branches: vec![DecisionBranch { condition: "tier == \"gold\"".to_string(), target: "vip".to_string() }],
                        default_target: None,
                    },
                ),
                node("vip", NodeConfig::End),
            ],
            vec![edge("e1", "start", "route")],
        );

        let execution = engine.run(&workflow, serde_json::json!({ "tier": "bronze" }), &NoopCallbacks).await.unwrap();
        assert_eq!(execution.status, WorkflowExecutionStatus::Failed);
        assert!(execution.error.is_some());
    }

    #[tokio::test]
    async fn parallel_all_waits_for_every_branch() {
        let db = Database::in_memory().await.unwrap();
        let engine = WorkflowEngine::with_defaults(db);

        let workflow = workflow_with(
            vec![
                node("start", NodeConfig::Start),
                node("fan", NodeConfig::Parallel { branches: vec!["a".to_string(), "b".to_string()], wait_for: ParallelWaitFor::All }),
                node("a", NodeConfig::Transform { operations: vec![TransformOp::Format { template: "a-done".to_string(), output: "a_out".to_string() }] }),
                node("b", NodeConfig::Transform { operations: vec![TransformOp::Format { template: "b-done".to_string(), output: "b_out".to_string() }] }),
                node("end", NodeConfig::End),
            ],
            vec![edge("e1", "start", "fan"), edge("e2", "fan", "end")],
        );

        let execution = engine.run(&workflow, serde_json::json!({}), &NoopCallbacks).await.unwrap();
        assert_eq!(execution.status, WorkflowExecutionStatus::Completed);
        assert_eq!(execution.variables["fan"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn loop_runs_body_once_per_element_up_to_max_iterations() {
        let db = Database::in_memory().await.unwrap();
        let engine = WorkflowEngine::with_defaults(db);

        let workflow = workflow_with(
            vec![
                node("start", NodeConfig::Start),
                node(
                    "iterate",
                    NodeConfig::Loop { collection: "items".to_string(), iterator: "item".to_string(), body: "body".to_string(), max_iterations: 2 },
                ),
                node("body", NodeConfig::Transform { operations: vec![TransformOp::Extract { input: "item".to_string(), path: "".to_string(), output: "seen".to_string() }] }),
                node("end", NodeConfig::End),
            ],
            vec![edge("e1", "start", "iterate"), edge("e2", "iterate", "end")],
        );

        let execution = engine
            .run(&workflow, serde_json::json!({ "items": [1, 2, 3] }), &NoopCallbacks)
            .await
            .unwrap();

        assert_eq!(execution.status, WorkflowExecutionStatus::Completed);
        assert_eq!(execution.variables["iterate"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn human_input_pauses_until_resumed() {
        let db = Database::in_memory().await.unwrap();
        let engine = WorkflowEngine::with_defaults(db);

        let workflow = workflow_with(
            vec![
                node("start", NodeConfig::Start),
                node("ask", NodeConfig::HumanInput { prompt: "approve?".to_string(), fields: vec!["decision".to_string()] }),
                node("end", NodeConfig::End),
            ],
            vec![edge("e1", "start", "ask"), edge("e2", "ask", "end")],
        );

        let waiting = engine.run(&workflow, serde_json::json!({}), &NoopCallbacks).await.unwrap();
        assert_eq!(waiting.status, WorkflowExecutionStatus::Waiting);
        assert!(waiting.current_nodes.contains("ask"));

        let resumed = engine
            .resume_human_input(&workflow, waiting, "ask", serde_json::json!({ "decision": "approved" }), &NoopCallbacks)
            .await
            .unwrap();
        assert_eq!(resumed.status, WorkflowExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn wait_node_with_duration_resolves_and_completes() {
        let db = Database::in_memory().await.unwrap();
        let engine = WorkflowEngine::with_defaults(db);

        let workflow = workflow_with(
            vec![
                node("start", NodeConfig::Start),
                node("pause", NodeConfig::Wait { duration_ms: Some(1), event: None, until: None }),
                node("end", NodeConfig::End),
            ],
            vec![edge("e1", "start", "pause"), edge("e2", "pause", "end")],
        );

        let execution = engine.run(&workflow, serde_json::json!({}), &NoopCallbacks).await.unwrap();
        assert_eq!(execution.status, WorkflowExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn unconditional_edge_guard_short_circuits_unmatched_branch() {
        let db = Database::in_memory().await.unwrap();
        let engine = WorkflowEngine::with_defaults(db);

        let mut conditional_edge = edge("e2", "check", "taken");
        conditional_edge.condition = Some("flag == true".to_string());
        let mut fallback_edge = edge("e3", "check", "skipped");
        fallback_edge.condition = Some("flag == false".to_string());

        let workflow = workflow_with(
            vec![
                node("start", NodeConfig::Start),
                node("check", NodeConfig::Transform { operations: vec![] }),
                node("taken", NodeConfig::End),
                node("skipped", NodeConfig::End),
            ],
            vec![edge("e1", "start", "check"), conditional_edge, fallback_edge],
        );

        let execution = engine.run(&workflow, serde_json::json!({ "flag": true }), &NoopCallbacks).await.unwrap();
        assert!(execution.node_executions.iter().any(|n| n.node_id == "taken"));
        assert!(!execution.node_executions.iter().any(|n| n.node_id == "skipped"));
    }
}
