//! Execution State Tracker.
//!
//! Owns every write to an execution record. The `dynamic_input` mirror is
//! maintained here but never trusted for decisions: the current pause is
//! always re-derived from the ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use humanloop_types::error::{ExecutionError, RepositoryError};
use humanloop_types::execution::{DynamicInput, Execution, ExecutionStatus, merge_input};
use humanloop_types::identity::Caller;
use humanloop_types::input_request::{InputRequest, InputRequestMetadata};
use humanloop_types::schema::InputSchema;
use serde::Serialize;
use uuid::Uuid;

use crate::ledger::InputRequestLedger;
use crate::repository::execution::{ExecutionFilter, ExecutionRepository, ExecutionUpdate};
use crate::repository::input_request::InputRequestRepository;

/// Read-only descriptor of the pause an execution is currently blocked on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRequirement {
    pub request_id: Uuid,
    pub step: u32,
    pub input_schema: InputSchema,
    pub timeout_at: DateTime<Utc>,
    /// Milliseconds left before the deadline, floored at zero.
    pub time_remaining: i64,
    pub is_expired: bool,
    pub metadata: InputRequestMetadata,
}

impl InputRequirement {
    pub fn from_request(request: &InputRequest, now: DateTime<Utc>) -> Self {
        Self {
            request_id: request.id,
            step: request.step,
            input_schema: request.input_schema.clone(),
            timeout_at: request.timeout_at,
            time_remaining: request.time_remaining(now).num_milliseconds(),
            is_expired: request.is_expired(now),
            metadata: request.metadata.clone(),
        }
    }
}

fn storage(e: RepositoryError) -> ExecutionError {
    ExecutionError::Storage(e.to_string())
}

/// Wall-clock milliseconds from `start` to `end`, floored at zero when the
/// clock stepped backwards.
pub(crate) fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let ms = (end - start).num_milliseconds();
    if ms < 0 {
        tracing::debug!(ms, "clock went backwards; recording zero duration");
    }
    ms.max(0).unsigned_abs()
}

/// Execution tracker generic over its storage backends.
pub struct ExecutionTracker<E: ExecutionRepository, R: InputRequestRepository> {
    repo: E,
    ledger: Arc<InputRequestLedger<R>>,
}

impl<E: ExecutionRepository, R: InputRequestRepository> ExecutionTracker<E, R> {
    pub fn new(repo: E, ledger: Arc<InputRequestLedger<R>>) -> Self {
        Self { repo, ledger }
    }

    pub fn repository(&self) -> &E {
        &self.repo
    }

    /// Record a freshly launched execution owned by `owner`.
    pub async fn launch(
        &self,
        owner: &Caller,
        workflow_id: &str,
        workflow_name: &str,
        input_data: Option<serde_json::Value>,
    ) -> Result<Execution, ExecutionError> {
        let execution = Execution::launch(owner, workflow_id, workflow_name, input_data);
        self.repo.create(&execution).await.map_err(storage)?;
        tracing::info!(
            execution_id = %execution.id,
            workflow_id,
            user_id = %owner.user_id,
            "execution launched"
        );
        Ok(execution)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Execution, ExecutionError> {
        self.repo
            .get(id)
            .await
            .map_err(storage)?
            .ok_or(ExecutionError::NotFound)
    }

    /// Fetch an execution, hiding ones the caller does not own.
    pub async fn get_owned(&self, id: &Uuid, caller: &Caller) -> Result<Execution, ExecutionError> {
        let execution = self.get(id).await?;
        if !execution.is_owned_by(caller) {
            tracing::debug!(execution_id = %id, user_id = %caller.user_id, "ownership mismatch");
            return Err(ExecutionError::NotFound);
        }
        Ok(execution)
    }

    pub async fn list_owned(
        &self,
        caller: &Caller,
        status: Option<ExecutionStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<Execution>, ExecutionError> {
        let filter = ExecutionFilter {
            owner: Some(caller.clone()),
            status,
            limit,
        };
        self.repo.list(&filter).await.map_err(storage)
    }

    pub async fn count_by_status(&self) -> Result<Vec<(ExecutionStatus, u64)>, ExecutionError> {
        self.repo.count_by_status().await.map_err(storage)
    }

    /// The pause the execution is blocked on, straight from the ledger.
    ///
    /// Includes a pending request whose deadline has passed but which the
    /// sweeper has not reaped yet, flagged with `is_expired`.
    pub async fn get_current_input_requirement(
        &self,
        execution_id: &Uuid,
    ) -> Result<Option<InputRequirement>, ExecutionError> {
        let open = self
            .ledger
            .find_open(execution_id)
            .await
            .map_err(|e| ExecutionError::Storage(e.to_string()))?;
        Ok(open.map(|request| InputRequirement::from_request(&request, Utc::now())))
    }

    /// Flip the execution into `waiting_for_input` for `step`.
    pub async fn mark_waiting(
        &self,
        execution_id: &Uuid,
        step: u32,
        webhook_url: &str,
    ) -> Result<(), ExecutionError> {
        let update = ExecutionUpdate::new(
            ExecutionStatus::WaitingForInput,
            DynamicInput::waiting(step, webhook_url),
        );
        self.apply(execution_id, &update).await
    }

    /// Merge handed-off input into the accumulator and clear the wait flag.
    ///
    /// The execution goes back to `running`; whether it finished or paused
    /// again is decided by the engine's resume response.
    pub async fn receive_input(
        &self,
        execution_id: &Uuid,
        sanitized: &serde_json::Value,
    ) -> Result<Execution, ExecutionError> {
        let current = self.get(execution_id).await?;
        let mut update = ExecutionUpdate::new(
            ExecutionStatus::Running,
            current.dynamic_input.cleared(),
        );
        update.input_data = Some(merge_input(&current.input_data, sanitized));
        self.apply(execution_id, &update).await?;
        self.get(execution_id).await
    }

    /// Return a waiting execution to `running` with the mirror cleared.
    pub async fn clear_waiting(&self, execution_id: &Uuid) -> Result<(), ExecutionError> {
        let current = self.get(execution_id).await?;
        let update = ExecutionUpdate::new(ExecutionStatus::Running, current.dynamic_input.cleared());
        self.apply(execution_id, &update).await
    }

    pub async fn mark_completed(
        &self,
        execution_id: &Uuid,
        output: Option<serde_json::Value>,
        duration_ms: u64,
    ) -> Result<(), ExecutionError> {
        let current = self.get(execution_id).await?;
        let mut update = ExecutionUpdate::new(
            ExecutionStatus::Completed,
            current.dynamic_input.cleared(),
        );
        update.output_data = output;
        update.duration_ms = Some(duration_ms);
        update.completed_at = Some(Utc::now());
        self.apply(execution_id, &update).await?;
        tracing::info!(%execution_id, duration_ms, "execution marked completed");
        Ok(())
    }

    pub async fn mark_failed(&self, execution_id: &Uuid, reason: &str) -> Result<(), ExecutionError> {
        let current = self.get(execution_id).await?;
        let now = Utc::now();
        let mut update = ExecutionUpdate::new(ExecutionStatus::Failed, current.dynamic_input.cleared());
        update.error = Some(reason.to_string());
        update.duration_ms = Some(elapsed_ms(current.created_at, now));
        update.completed_at = Some(now);
        self.apply(execution_id, &update).await?;
        tracing::warn!(%execution_id, reason, "execution marked failed");
        Ok(())
    }

    async fn apply(&self, execution_id: &Uuid, update: &ExecutionUpdate) -> Result<(), ExecutionError> {
        if self
            .repo
            .apply_update(execution_id, update)
            .await
            .map_err(storage)?
        {
            return Ok(());
        }
        let current = self.get(execution_id).await?;
        Err(ExecutionError::AlreadyTerminal(current.status))
    }
}
