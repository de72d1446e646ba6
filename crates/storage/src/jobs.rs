use chrono::{DateTime, Utc};
use contracts::{JobConfig, Schedule, ScheduledJob};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::Database;

fn row_to_job(row: SqliteRow) -> Result<ScheduledJob> {
    let id: String = row.try_get("id")?;
    let schedule: String = row.try_get("schedule")?;
    let config: String = row.try_get("config")?;
    let tags: String = row.try_get("tags")?;
    let metadata: String = row.try_get("metadata")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let enabled: i64 = row.try_get("enabled")?;

    Ok(ScheduledJob {
        id: Uuid::parse_str(&id).map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        schedule: serde_json::from_str::<Schedule>(&schedule)?,
        config: serde_json::from_str::<JobConfig>(&config)?,
        enabled: enabled != 0,
        max_retries: row.try_get::<i64, _>("max_retries")? as u32,
        retry_delay_ms: row.try_get::<i64, _>("retry_delay_ms")? as u64,
        timeout_ms: row.try_get::<i64, _>("timeout_ms")? as u64,
        tags: serde_json::from_str(&tags)?,
        metadata: serde_json::from_str(&metadata)?,
        created_at: DateTime::parse_from_rfc3339(&created_at).unwrap().with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at).unwrap().with_timezone(&Utc),
    })
}

/// Optional filter for [`Database::list_jobs`].
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub enabled: Option<bool>,
    pub tag: Option<String>,
}

impl Database {
    pub async fn create_job(&self, job: &ScheduledJob) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, name, description, schedule, config, enabled, max_retries,
                               retry_delay_ms, timeout_ms, tags, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id.to_string())
        .bind(&job.name)
        .bind(&job.description)
        .bind(serde_json::to_string(&job.schedule)?)
        .bind(serde_json::to_string(&job.config)?)
        .bind(job.enabled as i64)
        .bind(job.max_retries as i64)
        .bind(job.retry_delay_ms as i64)
        .bind(job.timeout_ms as i64)
        .bind(serde_json::to_string(&job.tags)?)
        .bind(serde_json::to_string(&job.metadata)?)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_job(&self, id: Uuid) -> Result<Option<ScheduledJob>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(row_to_job).transpose()
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<ScheduledJob>> {
        let rows = match filter.enabled {
            Some(enabled) => {
                sqlx::query("SELECT * FROM jobs WHERE enabled = ? ORDER BY created_at DESC")
                    .bind(enabled as i64)
                    .fetch_all(self.pool())
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM jobs ORDER BY created_at DESC")
                    .fetch_all(self.pool())
                    .await?
            }
        };

        let jobs = rows.into_iter().map(row_to_job).collect::<Result<Vec<_>>>()?;

        Ok(match &filter.tag {
            Some(tag) => jobs.into_iter().filter(|j| j.tags.iter().any(|t| t == tag)).collect(),
            None => jobs,
        })
    }

    pub async fn update_job(&self, job: &ScheduledJob) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET name = ?, description = ?, schedule = ?, config = ?, enabled = ?,
                max_retries = ?, retry_delay_ms = ?, timeout_ms = ?, tags = ?, metadata = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&job.name)
        .bind(&job.description)
        .bind(serde_json::to_string(&job.schedule)?)
        .bind(serde_json::to_string(&job.config)?)
        .bind(job.enabled as i64)
        .bind(job.max_retries as i64)
        .bind(job.retry_delay_ms as i64)
        .bind(job.timeout_ms as i64)
        .bind(serde_json::to_string(&job.tags)?)
        .bind(serde_json::to_string(&job.metadata)?)
        .bind(Utc::now().to_rfc3339())
        .bind(job.id.to_string())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn delete_job(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_job_enabled(&self, id: Uuid, enabled: bool) -> Result<()> {
        sqlx::query("UPDATE jobs SET enabled = ?, updated_at = ? WHERE id = ?")
            .bind(enabled as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn enable_job(&self, id: Uuid) -> Result<()> {
        self.set_job_enabled(id, true).await
    }

    pub async fn disable_job(&self, id: Uuid) -> Result<()> {
        self.set_job_enabled(id, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> ScheduledJob {
        ScheduledJob::new(
            "nightly digest",
            Schedule::Cron { expression: "0 2 * * *".to_string() },
            JobConfig::Task { message: "summarize yesterday's tasks".to_string() },
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let db = Database::in_memory().await.unwrap();
        let job = sample_job();
        db.create_job(&job).await.unwrap();

        let fetched = db.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, job.name);
        assert!(fetched.enabled);
    }

    #[tokio::test]
    async fn disable_then_list_enabled_excludes_it() {
        let db = Database::in_memory().await.unwrap();
        let job = sample_job();
        db.create_job(&job).await.unwrap();
        db.disable_job(job.id).await.unwrap();

        let enabled = db.list_jobs(&JobFilter { enabled: Some(true), tag: None }).await.unwrap();
        assert!(enabled.is_empty());

        let disabled = db.list_jobs(&JobFilter { enabled: Some(false), tag: None }).await.unwrap();
        assert_eq!(disabled.len(), 1);
    }

    #[tokio::test]
    async fn update_job_touches_updated_at() {
        let db = Database::in_memory().await.unwrap();
        let mut job = sample_job();
        db.create_job(&job).await.unwrap();

        job.name = "renamed digest".to_string();
        db.update_job(&job).await.unwrap();

        let fetched = db.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "renamed digest");
        assert!(fetched.updated_at >= job.created_at);
    }

    #[tokio::test]
    async fn delete_job_removes_it() {
        let db = Database::in_memory().await.unwrap();
        let job = sample_job();
        db.create_job(&job).await.unwrap();
        db.delete_job(job.id).await.unwrap();
        assert!(db.get_job(job.id).await.unwrap().is_none());
    }
}
