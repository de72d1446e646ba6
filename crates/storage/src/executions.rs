use chrono::{DateTime, Utc};
use contracts::{ErrorDetail, JobExecution, JobExecutionStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::Database;

fn status_str(status: JobExecutionStatus) -> &'static str {
    match status {
        JobExecutionStatus::Pending => "pending",
        JobExecutionStatus::Running => "running",
        JobExecutionStatus::Completed => "completed",
        JobExecutionStatus::Failed => "failed",
        JobExecutionStatus::Cancelled => "cancelled",
        JobExecutionStatus::Timeout => "timeout",
    }
}

fn status_from_str(s: &str) -> JobExecutionStatus {
    match s {
        "running" => JobExecutionStatus::Running,
        "completed" => JobExecutionStatus::Completed,
        "failed" => JobExecutionStatus::Failed,
        "cancelled" => JobExecutionStatus::Cancelled,
        "timeout" => JobExecutionStatus::Timeout,
        _ => JobExecutionStatus::Pending,
    }
}

fn row_to_execution(row: SqliteRow) -> Result<JobExecution> {
    let id: String = row.try_get("id")?;
    let job_id: String = row.try_get("job_id")?;
    let status: String = row.try_get("status")?;
    let scheduled_at: String = row.try_get("scheduled_at")?;
    let started_at: Option<String> = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;
    let result: Option<String> = row.try_get("result")?;
    let error: Option<String> = row.try_get("error")?;
    let duration_ms: Option<i64> = row.try_get("duration_ms")?;

    Ok(JobExecution {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        job_id: Uuid::parse_str(&job_id).map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        status: status_from_str(&status),
        scheduled_at: DateTime::parse_from_rfc3339(&scheduled_at)
            .map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))?
            .with_timezone(&Utc),
        started_at: started_at
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))
            })
            .transpose()?,
        completed_at: completed_at
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))
            })
            .transpose()?,
        result: result.map(|r| serde_json::from_str(&r)).transpose()?,
        error: error.map(|e| serde_json::from_str::<ErrorDetail>(&e)).transpose()?,
        retry_count: row.try_get::<i64, _>("retry_count")? as u32,
        duration_ms: duration_ms.map(|d| d as u64),
    })
}

/// Optional filter for [`Database::list_executions`].
#[derive(Debug, Default, Clone)]
pub struct ExecutionFilter {
    pub job_id: Option<Uuid>,
    pub status: Option<JobExecutionStatus>,
}

impl Database {
    pub async fn insert_execution(&self, execution: &JobExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO executions (id, job_id, status, scheduled_at, started_at, completed_at,
                                     result, error, retry_count, duration_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(execution.id.to_string())
        .bind(execution.job_id.to_string())
        .bind(status_str(execution.status))
        .bind(execution.scheduled_at.to_rfc3339())
        .bind(execution.started_at.map(|d| d.to_rfc3339()))
        .bind(execution.completed_at.map(|d| d.to_rfc3339()))
        .bind(execution.result.as_ref().map(serde_json::to_string).transpose()?)
        .bind(execution.error.as_ref().map(serde_json::to_string).transpose()?)
        .bind(execution.retry_count as i64)
        .bind(execution.duration_ms.map(|d| d as i64))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn update_execution(&self, execution: &JobExecution) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE executions
            SET status = ?, started_at = ?, completed_at = ?, result = ?, error = ?,
                retry_count = ?, duration_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(status_str(execution.status))
        .bind(execution.started_at.map(|d| d.to_rfc3339()))
        .bind(execution.completed_at.map(|d| d.to_rfc3339()))
        .bind(execution.result.as_ref().map(serde_json::to_string).transpose()?)
        .bind(execution.error.as_ref().map(serde_json::to_string).transpose()?)
        .bind(execution.retry_count as i64)
        .bind(execution.duration_ms.map(|d| d as i64))
        .bind(execution.id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<Option<JobExecution>> {
        let row = sqlx::query("SELECT * FROM executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(row_to_execution).transpose()
    }

    pub async fn list_executions(&self, filter: &ExecutionFilter) -> Result<Vec<JobExecution>> {
        let rows = match (&filter.job_id, &filter.status) {
            (Some(job_id), Some(status)) => {
                sqlx::query(
                    "SELECT * FROM executions WHERE job_id = ? AND status = ? ORDER BY scheduled_at DESC",
                )
                .bind(job_id.to_string())
                .bind(status_str(*status))
                .fetch_all(self.pool())
                .await?
            }
            (Some(job_id), None) => {
                sqlx::query("SELECT * FROM executions WHERE job_id = ? ORDER BY scheduled_at DESC")
                    .bind(job_id.to_string())
                    .fetch_all(self.pool())
                    .await?
            }
            (None, Some(status)) => {
                sqlx::query("SELECT * FROM executions WHERE status = ? ORDER BY scheduled_at DESC")
                    .bind(status_str(*status))
                    .fetch_all(self.pool())
                    .await?
            }
            (None, None) => {
                sqlx::query("SELECT * FROM executions ORDER BY scheduled_at DESC")
                    .fetch_all(self.pool())
                    .await?
            }
        };

        rows.into_iter().map(row_to_execution).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_then_update_execution_preserves_id() {
        let db = Database::in_memory().await.unwrap();
        let job_id = Uuid::now_v7();
        let mut execution = JobExecution::new_pending(job_id, Utc::now());
        db.insert_execution(&execution).await.unwrap();

        execution.status = JobExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        db.update_execution(&execution).await.unwrap();

        let fetched = db.get_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobExecutionStatus::Running);
        assert!(fetched.started_at.is_some());
    }

    #[tokio::test]
    async fn list_executions_filters_by_job_and_status() {
        let db = Database::in_memory().await.unwrap();
        let job_a = Uuid::now_v7();
        let job_b = Uuid::now_v7();
        db.insert_execution(&JobExecution::new_pending(job_a, Utc::now())).await.unwrap();
        let mut running = JobExecution::new_pending(job_b, Utc::now());
        running.status = JobExecutionStatus::Running;
        db.insert_execution(&running).await.unwrap();

        let for_a = db
            .list_executions(&ExecutionFilter { job_id: Some(job_a), status: None })
            .await
            .unwrap();
        assert_eq!(for_a.len(), 1);

        let running_only = db
            .list_executions(&ExecutionFilter { job_id: None, status: Some(JobExecutionStatus::Running) })
            .await
            .unwrap();
        assert_eq!(running_only.len(), 1);
        assert_eq!(running_only[0].job_id, job_b);
    }
}
