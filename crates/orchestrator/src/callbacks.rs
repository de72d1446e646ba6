// The orchestrator's only channel to the outside world: a callbacks trait
// the host (the streaming transport, a CLI, a test harness) implements to
// observe a task's progress. Every method has a no-op default so a caller
// only needs to override what it cares about.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

#[async_trait]
pub trait OrchestratorCallbacks: Send + Sync {
    async fn on_task_started(&self, _task_id: Uuid) {}

    async fn on_log(&self, _task_id: Uuid, _level: &str, _message: &str) {}

    async fn on_tool_call(&self, _task_id: Uuid, _tool_name: &str, _input: &Value) {}

    async fn on_progress(&self, _task_id: Uuid, _progress: f32, _step_id: Option<&str>) {}

    async fn on_task_completed(&self, _task_id: Uuid, _summary: &str) {}

    async fn on_task_error(&self, _task_id: Uuid, _error: &str) {}

    async fn on_cancelled(&self, _task_id: Uuid) {}
}

/// The default when a caller has no interest in progress events (tests,
/// ad-hoc scheduler-dispatched tasks).
#[derive(Default)]
pub struct NoopCallbacks;

impl OrchestratorCallbacks for NoopCallbacks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_callbacks_accept_every_event_without_panicking() {
        let callbacks = NoopCallbacks;
        let task_id = Uuid::now_v7();
        callbacks.on_task_started(task_id).await;
        callbacks.on_log(task_id, "info", "hello").await;
        callbacks.on_tool_call(task_id, "echo", &serde_json::json!({})).await;
        callbacks.on_progress(task_id, 0.5, Some("s1")).await;
        callbacks.on_task_completed(task_id, "done").await;
        callbacks.on_task_error(task_id, "boom").await;
        callbacks.on_cancelled(task_id).await;
    }
}
