//! Execution repository trait definition.

use chrono::{DateTime, Utc};
use humanloop_types::error::RepositoryError;
use humanloop_types::execution::{DynamicInput, Execution, ExecutionStatus};
use humanloop_types::identity::Caller;
use uuid::Uuid;

/// Filter criteria for listing executions.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    /// Restrict to executions owned by this caller.
    pub owner: Option<Caller>,
    pub status: Option<ExecutionStatus>,
    /// Maximum number of results.
    pub limit: Option<i64>,
}

/// A state change applied to a non-terminal execution.
///
/// `None` fields keep their stored value.
#[derive(Debug, Clone)]
pub struct ExecutionUpdate {
    pub status: ExecutionStatus,
    pub dynamic_input: DynamicInput,
    pub input_data: Option<serde_json::Value>,
    pub output_data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionUpdate {
    pub fn new(status: ExecutionStatus, dynamic_input: DynamicInput) -> Self {
        Self {
            status,
            dynamic_input,
            input_data: None,
            output_data: None,
            error: None,
            duration_ms: None,
            completed_at: None,
        }
    }
}

/// Repository trait for execution persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ExecutionRepository: Send + Sync {
    /// Insert a new execution record.
    fn create(
        &self,
        execution: &Execution,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an execution by ID.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Execution>, RepositoryError>> + Send;

    /// List executions, newest first.
    fn list(
        &self,
        filter: &ExecutionFilter,
    ) -> impl std::future::Future<Output = Result<Vec<Execution>, RepositoryError>> + Send;

    /// Count executions grouped by status.
    fn count_by_status(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<(ExecutionStatus, u64)>, RepositoryError>> + Send;

    /// Apply `update` only if the execution is not `completed`/`failed`.
    ///
    /// Returns `false` when the row is missing or already terminal.
    fn apply_update(
        &self,
        id: &Uuid,
        update: &ExecutionUpdate,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
