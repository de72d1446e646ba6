// Sqlite-backed persistence for tasks, plans, step results, scheduled jobs,
// job executions, workflows and workflow executions.
//
// `Database` wraps a single `SqlitePool`; every write is a single-row atomic
// statement (no multi-row transactions are required by the contract).
// Complex/nested fields are persisted as a JSON `data` column and
// deserialized back into the typed `contracts` struct on read.

pub mod error;
pub mod executions;
pub mod jobs;
pub mod plans;
pub mod schema;
pub mod step_results;
pub mod tasks;
pub mod workflows;

pub use error::{Result, StorageError};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if necessary) the sqlite file at `path` and run schema
    /// bootstrap. `path` is the value of the `DB_PATH`-style configuration
    /// option; `:memory:` is accepted for tests.
    pub async fn connect(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(path)
            .unwrap_or_else(|_| SqliteConnectOptions::new().filename(path))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let db = Self::new(pool);
        db.bootstrap().await?;
        Ok(db)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    pub async fn bootstrap(&self) -> Result<()> {
        schema::bootstrap(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn record_error(
        &self,
        task_id: Option<uuid::Uuid>,
        message: &str,
        stack: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO error_logs (task_id, message, stack, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(task_id.map(|id| id.to_string()))
        .bind(message)
        .bind(stack)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
