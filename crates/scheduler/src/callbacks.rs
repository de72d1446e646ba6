// The scheduler's only channel to the outside world, mirroring
// `orchestrator::OrchestratorCallbacks`: a small observer trait a host
// implements to react to job lifecycle events.

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait SchedulerCallbacks: Send + Sync {
    async fn on_job_started(&self, _job_id: Uuid, _execution_id: Uuid) {}

    async fn on_job_completed(&self, _job_id: Uuid, _execution_id: Uuid) {}

    async fn on_job_failed(&self, _job_id: Uuid, _execution_id: Uuid, _error: &str) {}
}

#[derive(Default)]
pub struct NoopCallbacks;

impl SchedulerCallbacks for NoopCallbacks {}
