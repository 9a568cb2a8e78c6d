//! SQLite execution repository implementation.
//!
//! Implements `ExecutionRepository` from `humanloop-core`. The `dynamic_input`
//! mirror is flattened into columns; payload blobs are stored as JSON text.

use chrono::Utc;
use humanloop_core::repository::execution::{ExecutionFilter, ExecutionRepository, ExecutionUpdate};
use humanloop_types::error::RepositoryError;
use humanloop_types::execution::{DynamicInput, Execution, ExecutionStatus};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_json, parse_uuid};

/// SQLite-backed implementation of `ExecutionRepository`.
pub struct SqliteExecutionRepository {
    pool: DatabasePool,
}

impl SqliteExecutionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, workspace_id, workflow_id, workflow_name, status, \
     is_waiting_for_input, current_step, webhook_url, input_data, output_data, error, \
     duration_ms, created_at, updated_at, completed_at FROM executions";

struct ExecutionRow {
    id: String,
    user_id: String,
    workspace_id: String,
    workflow_id: String,
    workflow_name: String,
    status: String,
    is_waiting_for_input: bool,
    current_step: i64,
    webhook_url: Option<String>,
    input_data: String,
    output_data: Option<String>,
    error: Option<String>,
    duration_ms: Option<i64>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl ExecutionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            workspace_id: row.try_get("workspace_id")?,
            workflow_id: row.try_get("workflow_id")?,
            workflow_name: row.try_get("workflow_name")?,
            status: row.try_get("status")?,
            is_waiting_for_input: row.try_get("is_waiting_for_input")?,
            current_step: row.try_get("current_step")?,
            webhook_url: row.try_get("webhook_url")?,
            input_data: row.try_get("input_data")?,
            output_data: row.try_get("output_data")?,
            error: row.try_get("error")?,
            duration_ms: row.try_get("duration_ms")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_execution(self) -> Result<Execution, RepositoryError> {
        let status: ExecutionStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Execution {
            id: parse_uuid(&self.id)?,
            user_id: self.user_id,
            workspace_id: self.workspace_id,
            workflow_id: self.workflow_id,
            workflow_name: self.workflow_name,
            status,
            dynamic_input: DynamicInput {
                is_waiting_for_input: self.is_waiting_for_input,
                current_step: self.current_step as u32,
                webhook_url: self.webhook_url,
            },
            input_data: parse_json(&self.input_data, "input_data")?,
            output_data: self
                .output_data
                .as_deref()
                .map(|s| parse_json(s, "output_data"))
                .transpose()?,
            error: self.error,
            duration_ms: self.duration_ms.map(|ms| ms as u64),
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

fn to_json(value: &serde_json::Value) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Query(format!("serialize JSON: {e}")))
}

impl ExecutionRepository for SqliteExecutionRepository {
    async fn create(&self, execution: &Execution) -> Result<(), RepositoryError> {
        let input_json = to_json(&execution.input_data)?;
        let output_json = execution.output_data.as_ref().map(to_json).transpose()?;

        sqlx::query(
            r#"INSERT INTO executions (id, user_id, workspace_id, workflow_id, workflow_name, status,
                 is_waiting_for_input, current_step, webhook_url, input_data, output_data, error,
                 duration_ms, created_at, updated_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(execution.id.to_string())
        .bind(&execution.user_id)
        .bind(&execution.workspace_id)
        .bind(&execution.workflow_id)
        .bind(&execution.workflow_name)
        .bind(execution.status.as_str())
        .bind(execution.dynamic_input.is_waiting_for_input)
        .bind(execution.dynamic_input.current_step)
        .bind(&execution.dynamic_input.webhook_url)
        .bind(&input_json)
        .bind(&output_json)
        .bind(&execution.error)
        .bind(execution.duration_ms.map(|ms| ms as i64))
        .bind(format_datetime(&execution.created_at))
        .bind(format_datetime(&execution.updated_at))
        .bind(execution.completed_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE") => {
                RepositoryError::Conflict(format!("execution '{}' already exists", execution.id))
            }
            other => RepositoryError::Query(other.to_string()),
        })?;

        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Execution>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = ExecutionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_execution()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, RepositoryError> {
        let user_id = filter.owner.as_ref().map(|o| o.user_id.as_str());
        let workspace_id = filter.owner.as_ref().map(|o| o.workspace_id.as_str());
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR workspace_id = ?2) \
             AND (?3 IS NULL OR status = ?3) ORDER BY created_at DESC, id DESC LIMIT ?4"
        ))
        .bind(user_id)
        .bind(workspace_id)
        .bind(status)
        .bind(filter.limit.unwrap_or(-1))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                ExecutionRow::from_row(row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?
                    .into_execution()
            })
            .collect()
    }

    async fn count_by_status(&self) -> Result<Vec<(ExecutionStatus, u64)>, RepositoryError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM executions GROUP BY status ORDER BY status")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let status: String = row.get("status");
                let count: i64 = row.get("n");
                let status = status.parse().map_err(RepositoryError::Query)?;
                Ok((status, count as u64))
            })
            .collect()
    }

    async fn apply_update(&self, id: &Uuid, update: &ExecutionUpdate) -> Result<bool, RepositoryError> {
        let input_json = update.input_data.as_ref().map(to_json).transpose()?;
        let output_json = update.output_data.as_ref().map(to_json).transpose()?;

        let result = sqlx::query(
            r#"UPDATE executions SET
                 status = ?,
                 is_waiting_for_input = ?,
                 current_step = ?,
                 webhook_url = ?,
                 input_data = COALESCE(?, input_data),
                 output_data = COALESCE(?, output_data),
                 error = COALESCE(?, error),
                 duration_ms = COALESCE(?, duration_ms),
                 completed_at = COALESCE(?, completed_at),
                 updated_at = ?
               WHERE id = ? AND status NOT IN ('completed', 'failed')"#,
        )
        .bind(update.status.as_str())
        .bind(update.dynamic_input.is_waiting_for_input)
        .bind(update.dynamic_input.current_step)
        .bind(&update.dynamic_input.webhook_url)
        .bind(&input_json)
        .bind(&output_json)
        .bind(&update.error)
        .bind(update.duration_ms.map(|ms| ms as i64))
        .bind(update.completed_at.as_ref().map(format_datetime))
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_pool;
    use humanloop_types::identity::Caller;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = SqliteExecutionRepository::new(test_pool().await);
        let exec = Execution::launch(
            &Caller::new("u1", "w1"),
            "wf-1",
            "Onboarding",
            Some(json!({"seed": 1})),
        );
        repo.create(&exec).await.unwrap();

        let loaded = repo.get(&exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, exec.id);
        assert_eq!(loaded.status, ExecutionStatus::Running);
        assert_eq!(loaded.input_data, json!({"seed": 1}));
        assert_eq!(loaded.dynamic_input, DynamicInput::default());
        assert!(repo.get(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let repo = SqliteExecutionRepository::new(test_pool().await);
        let exec = Execution::launch(&Caller::new("u1", "w1"), "wf-1", "Onboarding", None);
        repo.create(&exec).await.unwrap();
        assert!(matches!(
            repo.create(&exec).await.unwrap_err(),
            RepositoryError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_apply_update_until_terminal() {
        let repo = SqliteExecutionRepository::new(test_pool().await);
        let exec = Execution::launch(&Caller::new("u1", "w1"), "wf-1", "Onboarding", None);
        repo.create(&exec).await.unwrap();

        let waiting = ExecutionUpdate::new(
            ExecutionStatus::WaitingForInput,
            DynamicInput::waiting(1, "https://engine/r/1"),
        );
        assert!(repo.apply_update(&exec.id, &waiting).await.unwrap());
        let loaded = repo.get(&exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::WaitingForInput);
        assert_eq!(loaded.dynamic_input.current_step, 1);
        assert_eq!(loaded.dynamic_input.webhook_url.as_deref(), Some("https://engine/r/1"));

        let mut done = ExecutionUpdate::new(ExecutionStatus::Completed, loaded.dynamic_input.cleared());
        done.output_data = Some(json!({"ok": true}));
        done.duration_ms = Some(42);
        done.completed_at = Some(Utc::now());
        assert!(repo.apply_update(&exec.id, &done).await.unwrap());

        let loaded = repo.get(&exec.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Completed);
        assert_eq!(loaded.output_data, Some(json!({"ok": true})));
        assert_eq!(loaded.duration_ms, Some(42));
        assert_eq!(loaded.input_data, json!({}));

        // terminal rows are never updated again
        assert!(!repo.apply_update(&exec.id, &waiting).await.unwrap());
        assert!(!repo.apply_update(&Uuid::now_v7(), &waiting).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_by_owner_and_status() {
        let repo = SqliteExecutionRepository::new(test_pool().await);
        let alice = Caller::new("alice", "w1");
        let bob = Caller::new("bob", "w1");
        for i in 0..3 {
            let e = Execution::launch(&alice, format!("wf-{i}"), "A", None);
            repo.create(&e).await.unwrap();
        }
        let b = Execution::launch(&bob, "wf-b", "B", None);
        repo.create(&b).await.unwrap();
        let update = ExecutionUpdate::new(ExecutionStatus::Failed, DynamicInput::default());
        repo.apply_update(&b.id, &update).await.unwrap();

        let filter = ExecutionFilter {
            owner: Some(alice.clone()),
            ..Default::default()
        };
        assert_eq!(repo.list(&filter).await.unwrap().len(), 3);

        let limited = ExecutionFilter {
            owner: Some(alice),
            limit: Some(2),
            ..Default::default()
        };
        assert_eq!(repo.list(&limited).await.unwrap().len(), 2);

        let failed = ExecutionFilter {
            status: Some(ExecutionStatus::Failed),
            ..Default::default()
        };
        let found = repo.list(&failed).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, b.id);

        let counts = repo.count_by_status().await.unwrap();
        assert!(counts.contains(&(ExecutionStatus::Running, 3)));
        assert!(counts.contains(&(ExecutionStatus::Failed, 1)));
    }
}
