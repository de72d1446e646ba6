use chrono::{DateTime, Utc};
use contracts::{Task, TaskPhase, TaskPriority, TaskStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::Database;

fn phase_str(phase: TaskPhase) -> &'static str {
    match phase {
        TaskPhase::Planning => "planning",
        TaskPhase::Executing => "executing",
        TaskPhase::Completed => "completed",
        TaskPhase::Failed => "failed",
    }
}

fn phase_from_str(s: &str) -> TaskPhase {
    match s {
        "executing" => TaskPhase::Executing,
        "completed" => TaskPhase::Completed,
        "failed" => TaskPhase::Failed,
        _ => TaskPhase::Planning,
    }
}

fn priority_str(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::Low => "low",
        TaskPriority::Normal => "normal",
        TaskPriority::High => "high",
    }
}

fn priority_from_str(s: &str) -> TaskPriority {
    match s {
        "low" => TaskPriority::Low,
        "high" => TaskPriority::High,
        _ => TaskPriority::Normal,
    }
}

fn row_to_task(row: SqliteRow) -> Result<Task> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;
    let context: String = row.try_get("context")?;
    let constraints: String = row.try_get("constraints")?;
    let priority: String = row.try_get("priority")?;
    let deadline: Option<String> = row.try_get("deadline")?;
    let phase: String = row.try_get("phase")?;
    let progress: f64 = row.try_get("progress")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Task {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        user_id: Uuid::parse_str(&user_id).map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        goal: row.try_get("goal")?,
        context: serde_json::from_str(&context)?,
        constraints: serde_json::from_str(&constraints)?,
        priority: priority_from_str(&priority),
        deadline: deadline.map(|d| DateTime::parse_from_rfc3339(&d).unwrap().with_timezone(&Utc)),
        status: TaskStatus { phase: phase_from_str(&phase), progress: progress as f32 },
        summary: row.try_get("summary")?,
        error: row.try_get("error")?,
        created_at: DateTime::parse_from_rfc3339(&created_at).unwrap().with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at).unwrap().with_timezone(&Utc),
    })
}

impl Database {
    pub async fn save_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, user_id, goal, context, constraints, priority, deadline,
                                phase, progress, summary, error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                goal = excluded.goal,
                context = excluded.context,
                constraints = excluded.constraints,
                priority = excluded.priority,
                deadline = excluded.deadline,
                phase = excluded.phase,
                progress = excluded.progress,
                summary = excluded.summary,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(task.id.to_string())
        .bind(task.user_id.to_string())
        .bind(&task.goal)
        .bind(serde_json::to_string(&task.context)?)
        .bind(serde_json::to_string(&task.constraints)?)
        .bind(priority_str(task.priority))
        .bind(task.deadline.map(|d| d.to_rfc3339()))
        .bind(phase_str(task.status.phase))
        .bind(task.status.progress as f64)
        .bind(&task.summary)
        .bind(&task.error)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;

        row.map(row_to_task).transpose()
    }

    /// Update a task's status and touch `updated_at`. Used by a running
    /// orchestrator to advance `phase`/`progress` and stamp the final
    /// summary/error without re-saving the whole record.
    pub async fn update_task_status(
        &self,
        id: Uuid,
        status: &TaskStatus,
        summary: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE tasks
            SET phase = ?, progress = ?, summary = COALESCE(?, summary), error = COALESCE(?, error), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(phase_str(status.phase))
        .bind(status.progress as f64)
        .bind(summary)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Newest-first, per the contract.
    pub async fn list_tasks_by_user(
        &self,
        user_id: Uuid,
        phase: Option<TaskPhase>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>> {
        let rows = match phase {
            Some(p) => {
                sqlx::query("SELECT * FROM tasks WHERE user_id = ? AND phase = ? ORDER BY created_at DESC LIMIT ? OFFSET ?")
                    .bind(user_id.to_string())
                    .bind(phase_str(p))
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool())
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM tasks WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?")
                    .bind(user_id.to_string())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.pool())
                    .await?
            }
        };

        rows.into_iter().map(row_to_task).collect()
    }

    /// Deployment-wide task counts for the `/api/stats` dashboard: total,
    /// terminal completed/failed, and currently executing or planning.
    pub async fn task_counts(&self) -> Result<TaskCounts> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks").fetch_one(self.pool()).await?;
        let completed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE phase = 'completed'")
            .fetch_one(self.pool())
            .await?;
        let failed: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE phase = 'failed'")
            .fetch_one(self.pool())
            .await?;
        let running: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE phase IN ('planning', 'executing')")
            .fetch_one(self.pool())
            .await?;

        Ok(TaskCounts {
            total: total as usize,
            completed: completed as usize,
            failed: failed as usize,
            running: running as usize,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TaskCounts {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub running: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_get_round_trips_field_identical() {
        let db = Database::in_memory().await.unwrap();
        let task = Task::new(Uuid::now_v7(), "research quantum sensors");
        db.save_task(&task).await.unwrap();

        let fetched = db.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, task.id);
        assert_eq!(fetched.goal, task.goal);
        assert_eq!(fetched.status.phase, task.status.phase);
    }

    #[tokio::test]
    async fn get_task_in_terminal_phase_is_idempotent_across_reads() {
        let db = Database::in_memory().await.unwrap();
        let mut task = Task::new(Uuid::now_v7(), "goal");
        task.status.phase = TaskPhase::Completed;
        db.save_task(&task).await.unwrap();

        let first = db.get_task(task.id).await.unwrap().unwrap();
        let second = db.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(first.status.phase, second.status.phase);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn list_tasks_by_user_orders_newest_first() {
        let db = Database::in_memory().await.unwrap();
        let user = Uuid::now_v7();
        let mut t1 = Task::new(user, "first");
        t1.created_at = t1.created_at - chrono::Duration::seconds(10);
        let t2 = Task::new(user, "second");
        db.save_task(&t1).await.unwrap();
        db.save_task(&t2).await.unwrap();

        let listed = db.list_tasks_by_user(user, None, 10, 0).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, t2.id);
    }

    #[tokio::test]
    async fn task_counts_buckets_by_phase() {
        let db = Database::in_memory().await.unwrap();
        let user = Uuid::now_v7();

        let mut completed = Task::new(user, "a");
        completed.status.phase = TaskPhase::Completed;
        db.save_task(&completed).await.unwrap();

        let mut failed = Task::new(user, "b");
        failed.status.phase = TaskPhase::Failed;
        db.save_task(&failed).await.unwrap();

        db.save_task(&Task::new(user, "c")).await.unwrap();

        let counts = db.task_counts().await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.running, 1);
    }
}
