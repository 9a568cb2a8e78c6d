//! In-memory fakes shared by the unit tests of this crate.
//!
//! The repositories apply the same compare-and-transition rules as the SQLite
//! implementation: every check and write happens under one lock acquisition.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use humanloop_types::error::{CONFLICT_PENDING_STEP, CONFLICT_WEBHOOK_URL, RepositoryError};
use humanloop_types::execution::{Execution, ExecutionStatus};
use humanloop_types::input_request::{InputRequest, InputRequestStatus};
use uuid::Uuid;

use crate::repository::execution::{ExecutionFilter, ExecutionRepository, ExecutionUpdate};
use crate::repository::input_request::{ClaimGuard, InputRequestRepository};
use crate::resume::callback::{CallbackError, ResumeCallback, ResumeOutcome, ResumePayload};

#[derive(Default, Clone)]
pub(crate) struct InMemoryExecutions {
    rows: Arc<Mutex<HashMap<Uuid, Execution>>>,
}

impl ExecutionRepository for InMemoryExecutions {
    async fn create(&self, execution: &Execution) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&execution.id) {
            return Err(RepositoryError::Conflict("id".to_string()));
        }
        rows.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Execution>, RepositoryError> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn list(&self, filter: &ExecutionFilter) -> Result<Vec<Execution>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<Execution> = rows
            .values()
            .filter(|e| filter.owner.as_ref().is_none_or(|o| e.is_owned_by(o)))
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            found.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(found)
    }

    async fn count_by_status(&self) -> Result<Vec<(ExecutionStatus, u64)>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        let mut counts: HashMap<ExecutionStatus, u64> = HashMap::new();
        for e in rows.values() {
            *counts.entry(e.status).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn apply_update(&self, id: &Uuid, update: &ExecutionUpdate) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(id) else {
            return Ok(false);
        };
        if row.status.is_terminal() {
            return Ok(false);
        }
        row.status = update.status;
        row.dynamic_input = update.dynamic_input.clone();
        if let Some(input) = &update.input_data {
            row.input_data = input.clone();
        }
        if let Some(output) = &update.output_data {
            row.output_data = Some(output.clone());
        }
        if let Some(error) = &update.error {
            row.error = Some(error.clone());
        }
        if let Some(ms) = update.duration_ms {
            row.duration_ms = Some(ms);
        }
        if let Some(at) = update.completed_at {
            row.completed_at = Some(at);
        }
        row.updated_at = Utc::now();
        Ok(true)
    }
}

struct RequestRow {
    request: InputRequest,
    claim: Option<(String, DateTime<Utc>)>,
}

impl RequestRow {
    fn has_live_claim(&self, stale_before: DateTime<Utc>) -> bool {
        self.claim.as_ref().is_some_and(|(_, at)| *at >= stale_before)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryInputRequests {
    rows: Arc<Mutex<HashMap<Uuid, RequestRow>>>,
}

fn pending(row: &RequestRow) -> bool {
    row.request.status == InputRequestStatus::Pending
}

impl InputRequestRepository for InMemoryInputRequests {
    async fn insert(&self, request: &InputRequest) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|r| r.request.webhook_url == request.webhook_url) {
            return Err(RepositoryError::Conflict(CONFLICT_WEBHOOK_URL.to_string()));
        }
        if request.status == InputRequestStatus::Pending
            && rows.values().any(|r| {
                pending(r)
                    && r.request.execution_id == request.execution_id
                    && r.request.step == request.step
            })
        {
            return Err(RepositoryError::Conflict(CONFLICT_PENDING_STEP.to_string()));
        }
        rows.insert(
            request.id,
            RequestRow {
                request: request.clone(),
                claim: None,
            },
        );
        Ok(())
    }

    async fn get(&self, id: &Uuid) -> Result<Option<InputRequest>, RepositoryError> {
        Ok(self.rows.lock().unwrap().get(id).map(|r| r.request.clone()))
    }

    async fn find_open(&self, execution_id: &Uuid) -> Result<Option<InputRequest>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|r| pending(r) && r.request.execution_id == *execution_id)
            .max_by_key(|r| r.request.step)
            .map(|r| r.request.clone()))
    }

    async fn find_pending_by_webhook(
        &self,
        webhook_url: &str,
    ) -> Result<Option<InputRequest>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .find(|r| pending(r) && r.request.webhook_url == webhook_url)
            .map(|r| r.request.clone()))
    }

    async fn latest_step(&self, execution_id: &Uuid) -> Result<Option<u32>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|r| r.request.execution_id == *execution_id)
            .map(|r| r.request.step)
            .max())
    }

    async fn list_for_execution(
        &self,
        execution_id: &Uuid,
    ) -> Result<Vec<InputRequest>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<InputRequest> = rows
            .values()
            .filter(|r| r.request.execution_id == *execution_id)
            .map(|r| r.request.clone())
            .collect();
        found.sort_by_key(|r| r.step);
        Ok(found)
    }

    async fn list_overdue(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Vec<InputRequest>, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<InputRequest> = rows
            .values()
            .filter(|r| pending(r) && r.request.timeout_at < now && !r.has_live_claim(stale_before))
            .map(|r| r.request.clone())
            .collect();
        found.sort_by_key(|r| r.timeout_at);
        Ok(found)
    }

    async fn count_pending(&self) -> Result<u64, RepositoryError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().filter(|r| pending(r)).count() as u64)
    }

    async fn claim(
        &self,
        id: &Uuid,
        token: &str,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(id) {
            Some(row) if pending(row) && !row.has_live_claim(stale_before) => {
                row.claim = Some((token.to_string(), now));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_claim(&self, id: &Uuid, token: &str) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(id) {
            Some(row) if row.claim.as_ref().is_some_and(|(t, _)| t == token) => {
                row.claim = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transition(
        &self,
        id: &Uuid,
        to: InputRequestStatus,
        input_data: Option<&serde_json::Value>,
        guard: &ClaimGuard,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(id) else {
            return Ok(false);
        };
        if !pending(row) {
            return Ok(false);
        }
        let allowed = match guard {
            ClaimGuard::Holder(token) => row.claim.as_ref().is_some_and(|(t, _)| t == token),
            ClaimGuard::Unclaimed { stale_before } => !row.has_live_claim(*stale_before),
        };
        if !allowed {
            return Ok(false);
        }
        row.request.status = to;
        row.request.input_data = input_data.cloned();
        row.request.updated_at = now;
        row.request.resolved_at = Some(now);
        row.claim = None;
        Ok(true)
    }
}

/// Callback fake that replays a script of outcomes and records every call.
///
/// Once the script runs out it answers `Continuing`.
#[derive(Default)]
pub(crate) struct ScriptedCallback {
    script: Mutex<VecDeque<Result<ResumeOutcome, CallbackError>>>,
    calls: Mutex<Vec<(String, ResumePayload)>>,
    delay: Option<std::time::Duration>,
}

impl ScriptedCallback {
    pub(crate) fn then(self, outcome: Result<ResumeOutcome, CallbackError>) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub(crate) fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, ResumePayload)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ResumeCallback for ScriptedCallback {
    async fn resume(
        &self,
        webhook_url: &str,
        payload: &ResumePayload,
    ) -> Result<ResumeOutcome, CallbackError> {
        self.calls
            .lock()
            .unwrap()
            .push((webhook_url.to_string(), payload.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ResumeOutcome::Continuing))
    }
}
