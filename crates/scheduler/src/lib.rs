// Cron/interval/once job scheduling: a periodic tick loads enabled jobs,
// decides which are due, and launches each due job as an independent
// execution bounded by a global concurrency gate (`Semaphore`). Retries are
// scheduled by timer, each attempt recorded as its own `JobExecution` row
// linked by `retry_count` (see DESIGN.md for why this is timer-driven rather
// than re-evaluated against the cron schedule).

pub mod callbacks;
pub mod config;
pub mod cron;
pub mod dispatch;
pub mod error;

pub use callbacks::{NoopCallbacks, SchedulerCallbacks};
pub use config::SchedulerConfig;
pub use cron::ParsedCron;
pub use error::{Result, SchedulerError};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{JobExecution, JobExecutionStatus, Schedule, ScheduledJob};
use orchestrator::Orchestrator;
use storage::{jobs::JobFilter, executions::ExecutionFilter, Database};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use workflow_engine::WorkflowEngine;

pub struct Scheduler {
    db: Database,
    orchestrator: Arc<Orchestrator>,
    workflow_engine: Arc<WorkflowEngine>,
    http: reqwest::Client,
    config: SchedulerConfig,
    semaphore: Arc<Semaphore>,
    callbacks: Arc<dyn SchedulerCallbacks>,
}

impl Scheduler {
    pub fn new(
        db: Database,
        orchestrator: Arc<Orchestrator>,
        workflow_engine: Arc<WorkflowEngine>,
        config: SchedulerConfig,
        callbacks: Arc<dyn SchedulerCallbacks>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self { db, orchestrator, workflow_engine, http: reqwest::Client::new(), config, semaphore, callbacks }
    }

    pub fn with_defaults(
        db: Database,
        orchestrator: Arc<Orchestrator>,
        workflow_engine: Arc<WorkflowEngine>,
    ) -> Self {
        Self::new(db, orchestrator, workflow_engine, SchedulerConfig::from_env(), Arc::new(NoopCallbacks))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Jobs currently executing, across ticks and retries.
    pub fn running_count(&self) -> usize {
        self.config.max_concurrent - self.semaphore.available_permits()
    }

    /// Spawns the periodic tick loop. Callers keep the returned handle if
    /// they want to abort it on shutdown; dropping the `Scheduler` does not
    /// stop an already-spawned loop since it holds its own `Arc` clones.
    pub fn spawn_tick_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(scheduler.config.tick_interval_ms));
            loop {
                interval.tick().await;
                if let Err(err) = scheduler.tick(Utc::now()).await {
                    warn!(error = %err, "scheduler tick failed");
                }
            }
        })
    }

    /// Evaluates every enabled job against `now` and launches the ones that
    /// are due, subject to the concurrency gate. Returns the ids of the
    /// executions launched this tick.
    pub async fn tick(self: &Arc<Self>, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let jobs = self.db.list_jobs(&JobFilter { enabled: Some(true), tag: None }).await?;
        let mut launched = Vec::new();

        for job in jobs {
            let last_execution = self
                .db
                .list_executions(&ExecutionFilter { job_id: Some(job.id), status: None })
                .await?
                .into_iter()
                .next();

            if !should_run(&job, now, last_execution.as_ref()) {
                continue;
            }

            let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                info!(job_id = %job.id, "scheduler at max_concurrent, deferring to next tick");
                continue;
            };

            let retry_count = 0;
            let mut execution = JobExecution::new_pending(job.id, now);
            execution.retry_count = retry_count;
            self.db.insert_execution(&execution).await?;
            launched.push(execution.id);

            let scheduler = Arc::clone(self);
            tokio::spawn(async move {
                scheduler.run_execution(job, execution, permit).await;
            });
        }

        Ok(launched)
    }

    /// Runs a job immediately, bypassing schedule evaluation (but not the
    /// concurrency gate) — the `POST /api/scheduler/jobs/:id/run` ad-hoc path.
    pub async fn run_job_now(self: &Arc<Self>, job_id: Uuid) -> Result<JobExecution> {
        let job = self.db.get_job(job_id).await?.ok_or(SchedulerError::JobNotFound(job_id))?;
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.expect("semaphore never closed");

        let now = Utc::now();
        let mut execution = JobExecution::new_pending(job.id, now);
        execution.retry_count = 0;
        self.db.insert_execution(&execution).await?;
        let snapshot = execution.clone();

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_execution(job, execution, permit).await;
        });

        Ok(snapshot)
    }

    async fn run_execution(
        self: Arc<Self>,
        job: ScheduledJob,
        mut execution: JobExecution,
        _permit: tokio::sync::OwnedSemaphorePermit,
    ) {
        execution.status = JobExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        if let Err(err) = self.db.update_execution(&execution).await {
            warn!(job_id = %job.id, error = %err, "failed to persist running execution");
            return;
        }
        self.callbacks.on_job_started(job.id, execution.id).await;

        let timeout = Duration::from_millis(if job.timeout_ms > 0 { job.timeout_ms } else { self.config.default_timeout_ms });
        let outcome =
            dispatch::dispatch_with_timeout(&job.config, &self.orchestrator, &self.workflow_engine, &self.http, timeout)
                .await;

        let completed_at = Utc::now();
        execution.completed_at = Some(completed_at);
        execution.duration_ms = execution
            .started_at
            .map(|started| (completed_at - started).num_milliseconds().max(0) as u64);

        match outcome {
            Ok(value) => {
                execution.status = JobExecutionStatus::Completed;
                execution.result = Some(value);
                let _ = self.db.update_execution(&execution).await;
                self.callbacks.on_job_completed(job.id, execution.id).await;
            }
            Err(err) => {
                execution.status =
                    if matches!(err, SchedulerError::Timeout) { JobExecutionStatus::Timeout } else { JobExecutionStatus::Failed };
                execution.error = Some(err.to_error_detail());
                let _ = self.db.update_execution(&execution).await;
                self.callbacks.on_job_failed(job.id, execution.id, &err.to_string()).await;

                if execution.retry_count < job.max_retries {
                    let delay = Duration::from_millis(if job.retry_delay_ms > 0 {
                        job.retry_delay_ms
                    } else {
                        self.config.default_retry_delay_ms
                    });
                    let scheduler = Arc::clone(&self);
                    let job = job.clone();
                    let retry_count = execution.retry_count + 1;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let Ok(permit) = Arc::clone(&scheduler.semaphore).try_acquire_owned() else {
                            warn!(job_id = %job.id, "scheduler at max_concurrent, dropping retry");
                            return;
                        };
                        let mut retry_execution = JobExecution::new_pending(job.id, Utc::now());
                        retry_execution.retry_count = retry_count;
                        if scheduler.db.insert_execution(&retry_execution).await.is_ok() {
                            scheduler.run_execution(job, retry_execution, permit).await;
                        }
                    });
                }
            }
        }
    }
}

fn should_run(job: &ScheduledJob, now: DateTime<Utc>, last_execution: Option<&JobExecution>) -> bool {
    match &job.schedule {
        Schedule::Cron { expression } => match ParsedCron::parse(expression) {
            Ok(cron) => cron.matches(now),
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "job has unparseable cron expression");
                false
            }
        },
        Schedule::Interval { interval_ms } => match last_execution {
            Some(execution) => {
                let reference = execution.started_at.unwrap_or(execution.scheduled_at);
                (now - reference).num_milliseconds() >= *interval_ms as i64
            }
            None => true,
        },
        Schedule::Once { at } => last_execution.is_none() && now >= *at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_loop::AgentRegistry;
    use contracts::JobConfig;
    use orchestrator::OrchestratorConfig;

    async fn test_scheduler(config: SchedulerConfig) -> Arc<Scheduler> {
        let db = Database::in_memory().await.unwrap();
        let orchestrator = Arc::new(Orchestrator::new(
            db.clone(),
            AgentRegistry::with_builtins(),
            agent_loop::ToolRegistry::new(),
            Arc::new(agent_loop::SimulatedProvider::default()),
            OrchestratorConfig::default(),
        ));
        let workflow_engine = Arc::new(WorkflowEngine::with_defaults(db.clone()));
        Arc::new(Scheduler::new(db, orchestrator, workflow_engine, config, Arc::new(NoopCallbacks)))
    }

    fn once_job(at: DateTime<Utc>) -> ScheduledJob {
        ScheduledJob::new("one shot", Schedule::Once { at }, JobConfig::Task { message: "ping".to_string() })
    }

    #[tokio::test]
    async fn once_job_with_past_at_and_no_prior_execution_runs() {
        assert!(should_run(&once_job(Utc::now() - chrono::Duration::hours(1)), Utc::now(), None));
    }

    #[tokio::test]
    async fn once_job_never_runs_twice() {
        let job = once_job(Utc::now() - chrono::Duration::hours(1));
        let execution = JobExecution::new_pending(job.id, Utc::now());
        assert!(!should_run(&job, Utc::now(), Some(&execution)));
    }

    #[tokio::test]
    async fn interval_job_runs_once_elapsed() {
        let job = ScheduledJob::new(
            "heartbeat",
            Schedule::Interval { interval_ms: 1_000 },
            JobConfig::Task { message: "ping".to_string() },
        );
        let mut execution = JobExecution::new_pending(job.id, Utc::now() - chrono::Duration::seconds(2));
        execution.started_at = Some(Utc::now() - chrono::Duration::seconds(2));
        assert!(should_run(&job, Utc::now(), Some(&execution)));

        let mut recent = JobExecution::new_pending(job.id, Utc::now());
        recent.started_at = Some(Utc::now());
        assert!(!should_run(&job, Utc::now(), Some(&recent)));
    }

    #[tokio::test]
    async fn concurrency_gate_caps_running_executions_at_tick_time() {
        let scheduler = test_scheduler(SchedulerConfig { max_concurrent: 2, ..SchedulerConfig::default() }).await;

        for i in 0..5 {
            let job = ScheduledJob::new(
                format!("job-{i}"),
                Schedule::Interval { interval_ms: 0 },
                JobConfig::Task { message: "ping".to_string() },
            );
            scheduler.database().create_job(&job).await.unwrap();
        }

        let launched = scheduler.tick(Utc::now()).await.unwrap();
        assert_eq!(launched.len(), 2);
        assert_eq!(scheduler.running_count(), 2);
    }

    #[tokio::test]
    async fn disabled_job_is_never_launched() {
        let scheduler = test_scheduler(SchedulerConfig::default()).await;
        let mut job = ScheduledJob::new(
            "disabled",
            Schedule::Interval { interval_ms: 0 },
            JobConfig::Task { message: "ping".to_string() },
        );
        job.enabled = false;
        scheduler.database().create_job(&job).await.unwrap();

        let launched = scheduler.tick(Utc::now()).await.unwrap();
        assert!(launched.is_empty());
    }

    #[tokio::test]
    async fn run_job_now_executes_and_records_a_completed_execution() {
        let scheduler = test_scheduler(SchedulerConfig::default()).await;
        let job = ScheduledJob::new(
            "ad hoc",
            Schedule::Once { at: Utc::now() + chrono::Duration::days(1) },
            JobConfig::Task { message: "ping".to_string() },
        );
        scheduler.database().create_job(&job).await.unwrap();

        let pending = scheduler.run_job_now(job.id).await.unwrap();
        assert_eq!(pending.status, JobExecutionStatus::Pending);

        // Give the spawned execution a moment to complete.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let fetched = scheduler.database().get_execution(pending.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobExecutionStatus::Completed);
    }
}
