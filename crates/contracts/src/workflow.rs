use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::ErrorDetail;

/// Per-node configuration for each of the ten node types a workflow may contain.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Start,
    End,
    Task {
        agent_id: String,
        /// `${var}`-interpolated task description.
        task_template: String,
    },
    Decision {
        /// Evaluated in order; first match wins.
        branches: Vec<DecisionBranch>,
        default_target: Option<String>,
    },
    Parallel {
        branches: Vec<String>,
        wait_for: ParallelWaitFor,
    },
    Loop {
        /// Variable name holding the collection to iterate.
        collection: String,
        /// Variable name bound to the current element on each iteration.
        iterator: String,
        /// Id of the single sub-node executed per iteration.
        body: String,
        max_iterations: u32,
    },
    Wait {
        duration_ms: Option<u64>,
        event: Option<String>,
        until: Option<String>,
    },
    HumanInput {
        prompt: String,
        fields: Vec<String>,
    },
    Webhook {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        body_template: Option<Value>,
    },
    Transform {
        operations: Vec<TransformOp>,
    },
}

fn default_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DecisionBranch {
    /// A restricted boolean expression evaluated against workflow variables.
    pub condition: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ParallelWaitFor {
    All,
    Any,
    Count(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    Map { input: String, expression: String, output: String },
    Filter { input: String, expression: String, output: String },
    Reduce { input: String, initial: Value, expression: String, output: String },
    Extract { input: String, path: String, output: String },
    Format { template: String, output: String },
    Merge { inputs: Vec<String>, output: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkflowNode {
    pub id: String,
    pub config: NodeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkflowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Only meaningful for edges leaving non-decision nodes that still want a
    /// guard; decision nodes encode their own branching in `NodeConfig::Decision`.
    pub condition: Option<String>,
}

/// A node graph: inputs, nodes, edges and initial variables.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub input_schema: Value,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn start_node_id(&self) -> Option<&str> {
        self.nodes
            .iter()
            .find(|n| matches!(n.config, NodeConfig::Start))
            .map(|n| n.id.as_str())
    }

    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn outgoing(&self, node_id: &str) -> Vec<&WorkflowEdge> {
        self.edges.iter().filter(|e| e.source == node_id).collect()
    }

    pub fn node_ids(&self) -> HashSet<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowExecutionStatus {
    Pending,
    Running,
    Paused,
    Waiting,
    Completed,
    Failed,
    Cancelled,
}

/// A record of each node's execution within a [`WorkflowExecution`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NodeExecutionRecord {
    pub node_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output: Option<Value>,
    pub error: Option<ErrorDetail>,
}

/// One run of a [`WorkflowDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: WorkflowExecutionStatus,
    pub input: Value,
    pub output: Option<Value>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub node_executions: Vec<NodeExecutionRecord>,
    #[serde(default)]
    pub current_nodes: HashSet<String>,
    pub error: Option<ErrorDetail>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(workflow_id: Uuid, input: Value, variables: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id,
            status: WorkflowExecutionStatus::Pending,
            input,
            output: None,
            variables,
            node_executions: Vec::new(),
            current_nodes: HashSet::new(),
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}
