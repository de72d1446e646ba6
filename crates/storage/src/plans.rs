use contracts::ExecutionPlan;
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;
use crate::Database;

impl Database {
    pub async fn save_plan(&self, plan: &ExecutionPlan) -> Result<()> {
        sqlx::query(
            "INSERT INTO plans (id, task_id, version, data, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(plan.id.to_string())
        .bind(plan.task_id.to_string())
        .bind(plan.version as i64)
        .bind(serde_json::to_string(plan)?)
        .bind(plan.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Returns the highest-versioned plan for a task, per the contract.
    pub async fn get_plan(&self, task_id: Uuid) -> Result<Option<ExecutionPlan>> {
        let row = sqlx::query(
            "SELECT data FROM plans WHERE task_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(task_id.to_string())
        .fetch_optional(self.pool())
        .await?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::PlanStep;

    fn step(id: &str) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            agent_id: "researcher".to_string(),
            action_type: "research".to_string(),
            action_params: serde_json::Value::Null,
            inputs: Vec::new(),
            depends_on: Vec::new(),
            timeout_ms: None,
            max_retries: 0,
            retry_delay_ms: None,
            requires_approval: false,
            approval_prompt: None,
        }
    }

    #[tokio::test]
    async fn get_plan_returns_highest_version() {
        let db = Database::in_memory().await.unwrap();
        let task_id = Uuid::now_v7();
        let v1 = ExecutionPlan::new(task_id, 1, vec![step("s1")]);
        let v2 = ExecutionPlan::new(task_id, 2, vec![step("s1"), step("s2")]);
        db.save_plan(&v1).await.unwrap();
        db.save_plan(&v2).await.unwrap();

        let fetched = db.get_plan(task_id).await.unwrap().unwrap();
        assert_eq!(fetched.version, 2);
        assert_eq!(fetched.steps.len(), 2);
    }

    #[tokio::test]
    async fn get_plan_for_unknown_task_is_none() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.get_plan(Uuid::now_v7()).await.unwrap().is_none());
    }
}
