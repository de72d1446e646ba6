// Tool Abstraction for Agent Loop
//
// Tools are defined via the `Tool` trait and registered with a `ToolRegistry`,
// which implements `ToolExecutor` for direct use with `AgentLoop`.
//
// Design decisions:
// - Tools are defined via a trait for flexibility (function-style tools).
// - ToolRegistry implements ToolExecutor for integration with the agent loop.
// - Error handling distinguishes between user-visible errors and internal errors.
// - Internal errors are logged but never exposed to the LLM (security).

use async_trait::async_trait;
use contracts::{ToolCall, ToolDefinition, ToolPolicy, ToolResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;

use crate::error::Result;
use crate::traits::ToolExecutor;

// ============================================================================
// Tool Execution Result - Error Handling Contract
// ============================================================================

/// Result of a tool execution.
///
/// - `Success`: executed successfully, result is returned to the model.
/// - `ToolError`: a tool-level error that is safe to show the model (e.g.
///   "city not found", "invalid date format").
/// - `InternalError`: a system-level error (database failure, missing
///   credential) that must never be exposed to the model verbatim.
///
/// Internal errors are logged in full and replaced with a generic message
/// before being returned, so sensitive details never leak into a model
/// transcript.
#[derive(Debug)]
pub enum ToolExecutionResult {
    Success(Value),
    ToolError(String),
    InternalError(ToolInternalError),
}

impl ToolExecutionResult {
    pub fn success(value: impl Into<Value>) -> Self {
        ToolExecutionResult::Success(value.into())
    }

    pub fn tool_error(message: impl Into<String>) -> Self {
        ToolExecutionResult::ToolError(message.into())
    }

    pub fn internal_error(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        ToolExecutionResult::InternalError(ToolInternalError::new(error))
    }

    pub fn internal_error_msg(message: impl Into<String>) -> Self {
        ToolExecutionResult::InternalError(ToolInternalError::from_message(message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolExecutionResult::Success(_))
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    pub fn into_tool_result(self, tool_call_id: &str, tool_name: &str) -> ToolResult {
        match self {
            ToolExecutionResult::Success(value) => ToolResult::ok(tool_call_id, value),
            ToolExecutionResult::ToolError(message) => ToolResult::err(tool_call_id, message),
            ToolExecutionResult::InternalError(err) => {
                error!(
                    tool_name = %tool_name,
                    tool_call_id = %tool_call_id,
                    error = %err.message,
                    "tool internal error (details hidden from model)"
                );
                ToolResult::err(tool_call_id, "An internal error occurred while executing the tool")
            }
        }
    }
}

#[derive(Debug)]
pub struct ToolInternalError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ToolInternalError {
    pub fn new(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self { message: error.to_string(), source: Some(Box::new(error)) }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self { message: message.into(), source: None }
    }
}

impl std::fmt::Display for ToolInternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolInternalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ============================================================================
// Tool Trait - Core Tool Abstraction
// ============================================================================

#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's unique name, used by the model to invoke it. Must be
    /// unique within a [`ToolRegistry`].
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema describing the tool's expected arguments.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, arguments: Value) -> ToolExecutionResult;

    fn policy(&self) -> ToolPolicy {
        ToolPolicy::Auto
    }

    fn to_definition(&self) -> ToolDefinition {
        let mut def = ToolDefinition::new(self.name(), self.description(), self.parameters_schema());
        def.policy = self.policy();
        def
    }
}

// ============================================================================
// ToolRegistry - Collection of Tools
// ============================================================================

/// Holds both executable tools and bare definitions (for tools implemented
/// out-of-process, e.g. webhook tools the orchestrator dispatches itself).
/// Implements [`ToolExecutor`] so it plugs directly into [`crate::AgentLoop`].
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    definitions: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new(), definitions: HashMap::new() }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let def = tool.to_definition();
        self.definitions.insert(def.name.clone(), def);
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.definitions.insert(tool.name().to_string(), tool.to_definition());
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Register a bare definition with no local executor, e.g. a webhook tool
    /// dispatched by the orchestrator rather than run in-process.
    pub fn register_definition(&mut self, def: ToolDefinition) {
        self.definitions.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn definition(&self, name: &str) -> Option<ToolDefinition> {
        self.definitions.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.definitions.keys().map(|s| s.as_str()).collect()
    }

    /// Tool definitions suitable for an [`crate::AgentConfig`].
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.definitions.values().cloned().collect()
    }

    pub fn unregister(&mut self, name: &str) {
        self.tools.remove(name);
        self.definitions.remove(name);
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.tool_names()).finish()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, tool_call: &ToolCall, _tool_def: &ToolDefinition) -> Result<ToolResult> {
        let tool = self
            .tools
            .get(&tool_call.name)
            .ok_or_else(|| crate::error::AgentLoopError::tool(format!("Tool not found: {}", tool_call.name)))?;

        let result = tool.execute(tool_call.arguments.clone()).await;
        Ok(result.into_tool_result(&tool_call.id, &tool_call.name))
    }
}

// ============================================================================
// Built-in illustrative tools
// ============================================================================

/// Echoes its input back. Exists to exercise the registry end-to-end in
/// tests and examples; real tool implementations are an external concern.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the provided text back unchanged."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "text": { "type": "string" } },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        match arguments.get("text").and_then(|v| v.as_str()) {
            Some(text) => ToolExecutionResult::success(serde_json::json!({ "text": text })),
            None => ToolExecutionResult::tool_error("missing required argument 'text'"),
        }
    }
}

/// Returns the current UTC time. A second illustrative, side-effect-free tool.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current UTC date and time in RFC 3339 format."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _arguments: Value) -> ToolExecutionResult {
        ToolExecutionResult::success(serde_json::json!({ "now": chrono::Utc::now().to_rfc3339() }))
    }
}

/// A thin `reqwest` wrapper, confirmation-gated since it performs outbound
/// network I/O on the model's behalf.
pub struct HttpGetTool {
    client: reqwest::Client,
}

impl Default for HttpGetTool {
    fn default() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

#[async_trait]
impl Tool for HttpGetTool {
    fn name(&self) -> &str {
        "http_get"
    }

    fn description(&self) -> &str {
        "Performs an HTTP GET request and returns the response status and body."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "url": { "type": "string" } },
            "required": ["url"]
        })
    }

    fn policy(&self) -> ToolPolicy {
        ToolPolicy::RequiresApproval
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let Some(url) = arguments.get("url").and_then(|v| v.as_str()) else {
            return ToolExecutionResult::tool_error("missing required argument 'url'");
        };

        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                match resp.text().await {
                    Ok(body) => ToolExecutionResult::success(serde_json::json!({ "status": status, "body": body })),
                    Err(e) => ToolExecutionResult::internal_error(e),
                }
            }
            Err(e) => ToolExecutionResult::internal_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_tool_returns_input() {
        let tool = EchoTool;
        let result = tool.execute(serde_json::json!({ "text": "hi" })).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn echo_tool_rejects_missing_argument() {
        let tool = EchoTool;
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, ToolExecutionResult::ToolError(_)));
    }

    #[tokio::test]
    async fn internal_error_is_hidden_from_caller() {
        let result = ToolExecutionResult::internal_error_msg("postgres connection refused");
        let tool_result = result.into_tool_result("call_1", "some_tool");
        let err = tool_result.error.unwrap();
        assert!(!err.contains("postgres"));
        assert_eq!(err, "An internal error occurred while executing the tool");
    }

    #[test]
    fn registry_round_trips_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        assert!(registry.has("echo"));
        assert_eq!(registry.tool_definitions().len(), 1);
    }
}
