use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a tool may run unattended or needs an explicit confirmation first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolPolicy {
    Auto,
    RequiresApproval,
}

impl Default for ToolPolicy {
    fn default() -> Self {
        ToolPolicy::Auto
    }
}

/// The manifest entry a provider sees for one registered tool.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema describing the tool's input shape.
    pub input_schema: Value,
    #[serde(default)]
    pub policy: ToolPolicy,
    pub cost_per_call: Option<f64>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            policy: ToolPolicy::Auto,
            cost_per_call: None,
        }
    }

    pub fn requires_approval(mut self) -> Self {
        self.policy = ToolPolicy::RequiresApproval;
        self
    }
}

/// A request from a model to invoke one tool.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// The result of executing a [`ToolCall`], ready to be fed back to the model.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, result: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn err(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            result: None,
            error: Some(error.into()),
        }
    }
}
