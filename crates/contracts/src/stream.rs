use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A frame a streaming client sends to the server over the WebSocket transport.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Task { message: String },
    Cancel { task_id: Uuid },
    Subscribe { task_id: Uuid },
    Unsubscribe { task_id: Uuid },
}

/// A frame the server sends to a streaming client.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { client_id: Uuid, authenticated: bool },
    Pong,
    TaskStarted { task_id: Uuid },
    Log { task_id: Uuid, level: String, message: String },
    ToolCall { task_id: Uuid, tool_name: String, input: Value },
    Progress { task_id: Uuid, progress: f32, step_id: Option<String> },
    TaskCompleted { task_id: Uuid, summary: String },
    TaskError { task_id: Uuid, error: String },
    Cancelled { task_id: Uuid },
}
