use chrono::{DateTime, Utc};
use contracts::{WorkflowDefinition, WorkflowExecution, WorkflowExecutionStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::Result;
use crate::Database;

fn row_to_workflow(row: SqliteRow) -> Result<WorkflowDefinition> {
    let data: String = row.try_get("data")?;
    Ok(serde_json::from_str(&data)?)
}

fn exec_status_str(status: WorkflowExecutionStatus) -> &'static str {
    match status {
        WorkflowExecutionStatus::Pending => "pending",
        WorkflowExecutionStatus::Running => "running",
        WorkflowExecutionStatus::Paused => "paused",
        WorkflowExecutionStatus::Waiting => "waiting",
        WorkflowExecutionStatus::Completed => "completed",
        WorkflowExecutionStatus::Failed => "failed",
        WorkflowExecutionStatus::Cancelled => "cancelled",
    }
}

fn row_to_execution(row: SqliteRow) -> Result<WorkflowExecution> {
    let data: String = row.try_get("data")?;
    Ok(serde_json::from_str(&data)?)
}

impl Database {
    /// Mirrors task persistence: upsert-on-id, timestamps carried on the
    /// typed struct rather than recomputed here.
    pub async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, version, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                version = excluded.version,
                data = excluded.data,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.name)
        .bind(workflow.version as i64)
        .bind(serde_json::to_string(workflow)?)
        .bind(workflow.created_at.to_rfc3339())
        .bind(workflow.updated_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_workflow(&self, id: Uuid) -> Result<Option<WorkflowDefinition>> {
        let row = sqlx::query("SELECT data FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(row_to_workflow).transpose()
    }

    pub async fn list_workflows(&self) -> Result<Vec<WorkflowDefinition>> {
        let rows = sqlx::query("SELECT data FROM workflows ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        rows.into_iter().map(row_to_workflow).collect()
    }

    pub async fn delete_workflow(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Append-only: each call persists a new execution row and then updates
    /// it in place as the run advances (insert once at start, update on
    /// every subsequent transition).
    pub async fn save_workflow_execution(&self, execution: &WorkflowExecution) -> Result<()> {
        let exists = self.get_workflow_execution(execution.id).await?.is_some();
        if exists {
            sqlx::query(
                r#"
                UPDATE workflow_executions
                SET status = ?, data = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(exec_status_str(execution.status))
            .bind(serde_json::to_string(execution)?)
            .bind(Utc::now().to_rfc3339())
            .bind(execution.id.to_string())
            .execute(self.pool())
            .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO workflow_executions (id, workflow_id, status, data, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(execution.id.to_string())
            .bind(execution.workflow_id.to_string())
            .bind(exec_status_str(execution.status))
            .bind(serde_json::to_string(execution)?)
            .bind(execution.started_at.to_rfc3339())
            .bind(execution.started_at.to_rfc3339())
            .execute(self.pool())
            .await?;
        }
        Ok(())
    }

    pub async fn get_workflow_execution(&self, id: Uuid) -> Result<Option<WorkflowExecution>> {
        let row = sqlx::query("SELECT data FROM workflow_executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await?;
        row.map(row_to_execution).transpose()
    }

    pub async fn list_workflow_executions(&self, workflow_id: Uuid) -> Result<Vec<WorkflowExecution>> {
        let rows = sqlx::query(
            "SELECT data FROM workflow_executions WHERE workflow_id = ? ORDER BY created_at DESC",
        )
        .bind(workflow_id.to_string())
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(row_to_execution).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{NodeConfig, WorkflowNode};
    use std::collections::HashMap;

    fn sample_workflow() -> WorkflowDefinition {
        let now = Utc::now();
        WorkflowDefinition {
            id: Uuid::now_v7(),
            name: "onboarding".to_string(),
            version: 1,
            input_schema: serde_json::Value::Null,
            nodes: vec![
                WorkflowNode { id: "start".to_string(), config: NodeConfig::Start },
                WorkflowNode { id: "end".to_string(), config: NodeConfig::End },
            ],
            edges: Vec::new(),
            variables: HashMap::new(),
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_then_get_workflow_round_trips() {
        let db = Database::in_memory().await.unwrap();
        let workflow = sample_workflow();
        db.save_workflow(&workflow).await.unwrap();

        let fetched = db.get_workflow(workflow.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "onboarding");
        assert_eq!(fetched.nodes.len(), 2);
    }

    #[tokio::test]
    async fn workflow_execution_insert_then_update_preserves_id() {
        let db = Database::in_memory().await.unwrap();
        let workflow = sample_workflow();
        db.save_workflow(&workflow).await.unwrap();

        let mut execution = WorkflowExecution::new(workflow.id, serde_json::json!({}), HashMap::new());
        db.save_workflow_execution(&execution).await.unwrap();

        execution.status = WorkflowExecutionStatus::Completed;
        execution.completed_at = Some(Utc::now());
        db.save_workflow_execution(&execution).await.unwrap();

        let fetched = db.get_workflow_execution(execution.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, WorkflowExecutionStatus::Completed);
    }
}
