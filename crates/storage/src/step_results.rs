use contracts::StepResult;
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;
use crate::Database;

impl Database {
    /// Append-only: a step may legitimately be retried, producing more than
    /// one result row for the same `step_id`.
    pub async fn save_step_result(&self, task_id: Uuid, result: &StepResult) -> Result<()> {
        sqlx::query(
            "INSERT INTO step_results (task_id, step_id, data, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(task_id.to_string())
        .bind(&result.step_id)
        .bind(serde_json::to_string(result)?)
        .bind(result.completed_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Insertion order, per the contract.
    pub async fn get_step_results(&self, task_id: Uuid) -> Result<Vec<StepResult>> {
        let rows = sqlx::query(
            "SELECT data FROM step_results WHERE task_id = ? ORDER BY row_id ASC",
        )
        .bind(task_id.to_string())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                let data: String = row.try_get("data")?;
                Ok(serde_json::from_str(&data)?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn step_results_preserve_insertion_order_across_retries() {
        let db = Database::in_memory().await.unwrap();
        let task_id = Uuid::now_v7();
        let started = Utc::now();

        let first = StepResult::failure(
            "s1",
            contracts::ErrorDetail::new(contracts::ErrorCode::StepFailed, "boom"),
            started,
        );
        let retry = StepResult::success("s1", serde_json::json!({"ok": true}), started);

        db.save_step_result(task_id, &first).await.unwrap();
        db.save_step_result(task_id, &retry).await.unwrap();

        let results = db.get_step_results(task_id).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
    }
}
