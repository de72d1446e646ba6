// The workflow engine's channel to the outside world, mirroring
// `orchestrator::OrchestratorCallbacks`: a host (streaming transport, CLI,
// test harness) implements this to observe node-level progress and to
// answer the two node types that need host involvement (`human_input`,
// `wait.event`).

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

#[async_trait]
pub trait WorkflowCallbacks: Send + Sync {
    async fn on_node_started(&self, _execution_id: Uuid, _node_id: &str) {}

    async fn on_node_completed(&self, _execution_id: Uuid, _node_id: &str, _output: &Value) {}

    async fn on_execution_completed(&self, _execution_id: Uuid) {}

    async fn on_execution_failed(&self, _execution_id: Uuid, _error: &str) {}

    /// Called when a `human_input` node is reached. Returning `None` pauses
    /// the execution (status transitions to `waiting`) until a host resumes
    /// it via [`crate::engine::WorkflowEngine::resume_human_input`].
    async fn on_human_input(&self, _execution_id: Uuid, _node_id: &str, _prompt: &str, _fields: &[String]) -> Option<Value> {
        None
    }

    /// Called on each tick while a `wait.event` node is pending. Returning
    /// `Some` resolves the wait with that value; `None` keeps waiting.
    async fn poll_event(&self, _execution_id: Uuid, _event_name: &str) -> Option<Value> {
        None
    }
}

/// The default when a caller has no interest in progress events and no
/// ability to answer `human_input`/`wait.event` nodes (tests, fire-and-forget
/// scheduler-dispatched runs of workflows that contain neither).
#[derive(Default)]
pub struct NoopCallbacks;

impl WorkflowCallbacks for NoopCallbacks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_callbacks_accept_every_event_without_panicking() {
        let callbacks = NoopCallbacks;
        let execution_id = Uuid::now_v7();
        callbacks.on_node_started(execution_id, "start").await;
        callbacks.on_node_completed(execution_id, "start", &serde_json::json!(null)).await;
        callbacks.on_execution_completed(execution_id).await;
        callbacks.on_execution_failed(execution_id, "boom").await;
        assert!(callbacks.on_human_input(execution_id, "n1", "?", &[]).await.is_none());
        assert!(callbacks.poll_event(execution_id, "evt").await.is_none());
    }
}
