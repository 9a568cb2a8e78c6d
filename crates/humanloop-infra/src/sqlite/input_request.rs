//! SQLite Input Request repository implementation.
//!
//! Every transition is a single `UPDATE ... WHERE status = 'pending'`; the
//! writer pool serializes them and `rows_affected` names the winner. The
//! partial unique index on `(execution_id, step) WHERE status = 'pending'`
//! makes concurrent creates for the same step collapse to one row.

use chrono::{DateTime, Utc};
use humanloop_core::repository::input_request::{ClaimGuard, InputRequestRepository};
use humanloop_types::error::{CONFLICT_PENDING_STEP, CONFLICT_WEBHOOK_URL, RepositoryError};
use humanloop_types::input_request::{InputRequest, InputRequestMetadata, InputRequestStatus};
use humanloop_types::schema::InputSchema;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, parse_json, parse_uuid};

/// SQLite-backed implementation of `InputRequestRepository`.
pub struct SqliteInputRequestRepository {
    pool: DatabasePool,
}

impl SqliteInputRequestRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, execution_id, step, webhook_url, input_schema, status, \
     timeout_at, input_data, metadata, created_at, updated_at, resolved_at FROM input_requests";

struct InputRequestRow {
    id: String,
    execution_id: String,
    step: i64,
    webhook_url: String,
    input_schema: String,
    status: String,
    timeout_at: String,
    input_data: Option<String>,
    metadata: String,
    created_at: String,
    updated_at: String,
    resolved_at: Option<String>,
}

impl InputRequestRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            execution_id: row.try_get("execution_id")?,
            step: row.try_get("step")?,
            webhook_url: row.try_get("webhook_url")?,
            input_schema: row.try_get("input_schema")?,
            status: row.try_get("status")?,
            timeout_at: row.try_get("timeout_at")?,
            input_data: row.try_get("input_data")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }

    fn into_request(self) -> Result<InputRequest, RepositoryError> {
        let status: InputRequestStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let input_schema: InputSchema = serde_json::from_str(&self.input_schema)
            .map_err(|e| RepositoryError::Query(format!("invalid input_schema JSON: {e}")))?;
        let metadata: InputRequestMetadata = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;

        Ok(InputRequest {
            id: parse_uuid(&self.id)?,
            execution_id: parse_uuid(&self.execution_id)?,
            step: self.step as u32,
            webhook_url: self.webhook_url,
            input_schema,
            status,
            timeout_at: parse_datetime(&self.timeout_at)?,
            input_data: self
                .input_data
                .as_deref()
                .map(|s| parse_json(s, "input_data"))
                .transpose()?,
            metadata,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            resolved_at: self.resolved_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

fn rows_to_requests(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<InputRequest>, RepositoryError> {
    rows.iter()
        .map(|row| {
            InputRequestRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?
                .into_request()
        })
        .collect()
}

fn row_to_request(row: Option<sqlx::sqlite::SqliteRow>) -> Result<Option<InputRequest>, RepositoryError> {
    row.map(|row| {
        InputRequestRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_request()
    })
    .transpose()
}

impl InputRequestRepository for SqliteInputRequestRepository {
    async fn insert(&self, request: &InputRequest) -> Result<(), RepositoryError> {
        let schema_json = serde_json::to_string(&request.input_schema)
            .map_err(|e| RepositoryError::Query(format!("serialize input_schema: {e}")))?;
        let metadata_json = serde_json::to_string(&request.metadata)
            .map_err(|e| RepositoryError::Query(format!("serialize metadata: {e}")))?;
        let input_json = request
            .input_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("serialize input_data: {e}")))?;

        let result = sqlx::query(
            r#"INSERT INTO input_requests (id, execution_id, step, webhook_url, input_schema, status,
                 timeout_at, input_data, metadata, created_at, updated_at, resolved_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(request.id.to_string())
        .bind(request.execution_id.to_string())
        .bind(request.step)
        .bind(&request.webhook_url)
        .bind(&schema_json)
        .bind(request.status.as_str())
        .bind(format_datetime(&request.timeout_at))
        .bind(&input_json)
        .bind(&metadata_json)
        .bind(format_datetime(&request.created_at))
        .bind(format_datetime(&request.updated_at))
        .bind(request.resolved_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                if db_err.message().contains("webhook_url") {
                    Err(RepositoryError::Conflict(CONFLICT_WEBHOOK_URL.to_string()))
                } else {
                    Err(RepositoryError::Conflict(CONFLICT_PENDING_STEP.to_string()))
                }
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn get(&self, id: &Uuid) -> Result<Option<InputRequest>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        row_to_request(row)
    }

    async fn find_open(&self, execution_id: &Uuid) -> Result<Option<InputRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE execution_id = ? AND status = 'pending' ORDER BY step DESC LIMIT 1"
        ))
        .bind(execution_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        row_to_request(row)
    }

    async fn find_pending_by_webhook(
        &self,
        webhook_url: &str,
    ) -> Result<Option<InputRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE webhook_url = ? AND status = 'pending'"
        ))
        .bind(webhook_url)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        row_to_request(row)
    }

    async fn latest_step(&self, execution_id: &Uuid) -> Result<Option<u32>, RepositoryError> {
        let (max,): (Option<i64>,) =
            sqlx::query_as("SELECT MAX(step) FROM input_requests WHERE execution_id = ?")
                .bind(execution_id.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(max.map(|step| step as u32))
    }

    async fn list_for_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<InputRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE execution_id = ? ORDER BY step ASC"
        ))
        .bind(execution_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        rows_to_requests(&rows)
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<InputRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE status = 'pending' AND timeout_at < ? \
             AND (claimed_at IS NULL OR claimed_at < ?) ORDER BY timeout_at ASC"
        ))
        .bind(format_datetime(&now))
        .bind(format_datetime(&stale_before))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
        rows_to_requests(&rows)
    }

    async fn count_pending(&self) -> Result<u64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM input_requests WHERE status = 'pending'")
                .fetch_one(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u64)
    }

    async fn claim(
        &self,
        id: &Uuid,
        token: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE input_requests SET claim_token = ?, claimed_at = ?
               WHERE id = ? AND status = 'pending'
                 AND (claimed_at IS NULL OR claimed_at < ?)"#,
        )
        .bind(token)
        .bind(format_datetime(&now))
        .bind(id.to_string())
        .bind(format_datetime(&stale_before))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, id: &Uuid, token: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE input_requests SET claim_token = NULL, claimed_at = NULL WHERE id = ? AND claim_token = ?",
        )
        .bind(id.to_string())
        .bind(token)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn transition(
        &self,
        id: &Uuid,
        to: InputRequestStatus,
        input_data: Option<&serde_json::Value>,
        guard: &ClaimGuard,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let input_json = input_data
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("serialize input_data: {e}")))?;
        let now = format_datetime(&now);

        let (guard_sql, guard_value) = match guard {
            ClaimGuard::Holder(token) => ("claim_token = ?", token.clone()),
            ClaimGuard::Unclaimed { stale_before } => (
                "(claimed_at IS NULL OR claimed_at < ?)",
                format_datetime(stale_before),
            ),
        };

        let result = sqlx::query(&format!(
            "UPDATE input_requests SET status = ?, input_data = ?, updated_at = ?, resolved_at = ?, \
             claim_token = NULL, claimed_at = NULL \
             WHERE id = ? AND status = 'pending' AND {guard_sql}"
        ))
        .bind(to.as_str())
        .bind(&input_json)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .bind(&guard_value)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
